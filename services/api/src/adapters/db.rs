//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RecordStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use school_admin_core::domain::{
    FeeTransaction, GradeEntry, GradeWrite, NewFeePayment, StudentFields, StudentPatch,
    StudentRecord,
};
use school_admin_core::ports::{PortError, PortResult, RecordStore, StoreTransaction};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

const STUDENT_COLUMNS: &str = "id, admission_number, name, date_of_birth, admission_date, \
     aadhar_number, pen_number, aapar_id, mobile_number, address, grade, section, \
     yearly_fee_amount";

/// `$2..$13` in the order `bind_fields` binds them.
const STUDENT_ASSIGNMENTS: &str = "admission_number = $2, name = $3, date_of_birth = $4, \
     admission_date = $5, aadhar_number = $6, pen_number = $7, aapar_id = $8, \
     mobile_number = $9, address = $10, grade = $11, section = $12, yearly_fee_amount = $13";

const FEE_COLUMNS: &str =
    "id, student_id, amount, payment_date, transaction_id, payment_mode, remarks";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RecordStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// One open Postgres transaction. Dropping it without `commit` rolls back.
pub struct DbTransaction {
    tx: Transaction<'static, Postgres>,
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct StudentRow {
    id: Uuid,
    admission_number: String,
    name: String,
    date_of_birth: Option<NaiveDate>,
    admission_date: Option<NaiveDate>,
    aadhar_number: Option<String>,
    pen_number: Option<String>,
    aapar_id: Option<String>,
    mobile_number: Option<String>,
    address: Option<String>,
    grade: Option<String>,
    section: Option<String>,
    yearly_fee_amount: Decimal,
}
impl StudentRow {
    fn to_domain(self) -> StudentRecord {
        StudentRecord {
            id: self.id,
            fields: StudentFields {
                admission_number: self.admission_number,
                name: self.name,
                date_of_birth: self.date_of_birth,
                admission_date: self.admission_date,
                aadhar_number: self.aadhar_number,
                pen_number: self.pen_number,
                aapar_id: self.aapar_id,
                mobile_number: self.mobile_number,
                address: self.address,
                grade: self.grade,
                section: self.section,
                yearly_fee_amount: self.yearly_fee_amount,
            },
        }
    }
}

#[derive(FromRow)]
struct GradeRow {
    student_id: Uuid,
    subject: String,
    marks: Decimal,
    term: String,
}
impl GradeRow {
    fn to_domain(self) -> GradeEntry {
        GradeEntry {
            student_id: self.student_id,
            subject: self.subject,
            marks: self.marks,
            term: self.term,
        }
    }
}

#[derive(FromRow)]
struct FeeRow {
    id: Uuid,
    student_id: Uuid,
    amount: Decimal,
    payment_date: NaiveDate,
    transaction_id: String,
    payment_mode: Option<String>,
    remarks: Option<String>,
}
impl FeeRow {
    fn to_domain(self) -> FeeTransaction {
        FeeTransaction {
            id: self.id,
            student_id: self.student_id,
            amount: self.amount,
            date: self.payment_date,
            transaction_id: self.transaction_id,
            payment_mode: self.payment_mode,
            remarks: self.remarks,
        }
    }
}

//=========================================================================================
// Query Helpers
//=========================================================================================

type StudentQuery<'q> = QueryAs<'q, Postgres, StudentRow, PgArguments>;

/// Binds every student column as `$2..$13`. `$1` is left to the caller.
fn bind_fields<'q>(query: StudentQuery<'q>, fields: &StudentFields) -> StudentQuery<'q> {
    query
        .bind(fields.admission_number.clone())
        .bind(fields.name.clone())
        .bind(fields.date_of_birth)
        .bind(fields.admission_date)
        .bind(fields.aadhar_number.clone())
        .bind(fields.pen_number.clone())
        .bind(fields.aapar_id.clone())
        .bind(fields.mobile_number.clone())
        .bind(fields.address.clone())
        .bind(fields.grade.clone())
        .bind(fields.section.clone())
        .bind(fields.yearly_fee_amount)
}

fn insert_student_sql() -> String {
    format!(
        "INSERT INTO students ({STUDENT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         ON CONFLICT (admission_number) DO NOTHING \
         RETURNING {STUDENT_COLUMNS}"
    )
}

/// Maps constraint violations onto the port's error kinds.
fn map_db_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            PortError::NotFound("Student not found".to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `StoreTransaction` Trait Implementation
//=========================================================================================

#[async_trait]
impl StoreTransaction for DbTransaction {
    async fn find_student_by_admission_number(
        &mut self,
        admission_number: &str,
    ) -> PortResult<Option<StudentRecord>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE admission_number = $1");
        let record = sqlx::query_as::<_, StudentRow>(&sql)
            .bind(admission_number)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.map(StudentRow::to_domain))
    }

    async fn insert_student(&mut self, fields: &StudentFields) -> PortResult<StudentRecord> {
        let sql = insert_student_sql();
        // A concurrent writer that took the key first shows up as no returned row
        // rather than an error, so the transaction stays usable.
        let record = bind_fields(sqlx::query_as::<_, StudentRow>(&sql).bind(Uuid::new_v4()), fields)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        record.map(StudentRow::to_domain).ok_or_else(|| {
            PortError::Conflict(format!(
                "Admission number {} already exists",
                fields.admission_number
            ))
        })
    }

    async fn update_student_by_admission_number(
        &mut self,
        admission_number: &str,
        fields: &StudentFields,
    ) -> PortResult<StudentRecord> {
        let fields = StudentFields {
            admission_number: admission_number.to_string(),
            ..fields.clone()
        };
        let sql = format!(
            "UPDATE students SET {STUDENT_ASSIGNMENTS} WHERE admission_number = $1 \
             RETURNING {STUDENT_COLUMNS}"
        );
        let record = bind_fields(sqlx::query_as::<_, StudentRow>(&sql).bind(admission_number), &fields)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        record.map(StudentRow::to_domain).ok_or_else(|| {
            PortError::NotFound(format!("Student {} not found", admission_number))
        })
    }

    async fn student_exists(&mut self, student_id: Uuid) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM students WHERE id = $1)")
            .bind(student_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn upsert_grade(&mut self, entry: &GradeEntry) -> PortResult<GradeWrite> {
        // `xmax` is zero only on a freshly inserted row version.
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO grades (id, student_id, subject, marks, term) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (student_id, subject, term) \
             DO UPDATE SET marks = EXCLUDED.marks, updated_at = NOW() \
             RETURNING (xmax = 0)",
        )
        .bind(Uuid::new_v4())
        .bind(entry.student_id)
        .bind(&entry.subject)
        .bind(entry.marks)
        .bind(&entry.term)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(if inserted {
            GradeWrite::Inserted
        } else {
            GradeWrite::Updated
        })
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for DbAdapter {
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Box::new(DbTransaction { tx }))
    }

    async fn list_students(&self) -> PortResult<Vec<StudentRecord>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY admission_number ASC");
        let records = sqlx::query_as::<_, StudentRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(StudentRow::to_domain).collect())
    }

    async fn find_student_by_admission_number(
        &self,
        admission_number: &str,
    ) -> PortResult<Option<StudentRecord>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE admission_number = $1");
        let record = sqlx::query_as::<_, StudentRow>(&sql)
            .bind(admission_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.map(StudentRow::to_domain))
    }

    async fn find_student_by_id(&self, student_id: Uuid) -> PortResult<Option<StudentRecord>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1");
        let record = sqlx::query_as::<_, StudentRow>(&sql)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.map(StudentRow::to_domain))
    }

    async fn create_student(&self, fields: &StudentFields) -> PortResult<StudentRecord> {
        let sql = insert_student_sql();
        let record = bind_fields(sqlx::query_as::<_, StudentRow>(&sql).bind(Uuid::new_v4()), fields)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;
        record.map(StudentRow::to_domain).ok_or_else(|| {
            PortError::Conflict(format!(
                "Admission number {} already exists",
                fields.admission_number
            ))
        })
    }

    async fn update_student(
        &self,
        admission_number: &str,
        patch: &StudentPatch,
    ) -> PortResult<StudentRecord> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let select = format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE admission_number = $1 FOR UPDATE"
        );
        let current = sqlx::query_as::<_, StudentRow>(&select)
            .bind(admission_number)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .ok_or_else(|| PortError::NotFound(format!("Student {} not found", admission_number)))?
            .to_domain();

        let merged = patch.apply_to(&current.fields);
        let update = format!(
            "UPDATE students SET {STUDENT_ASSIGNMENTS} WHERE id = $1 RETURNING {STUDENT_COLUMNS}"
        );
        let record = bind_fields(sqlx::query_as::<_, StudentRow>(&update).bind(current.id), &merged)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match map_db_error(e) {
                PortError::Conflict(_) => PortError::Conflict(format!(
                    "Admission number {} already exists",
                    merged.admission_number
                )),
                other => other,
            })?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn delete_student_by_id(&self, student_id: Uuid) -> PortResult<bool> {
        // Fee and grade rows go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(student_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_grades(&self) -> PortResult<Vec<GradeEntry>> {
        let records = sqlx::query_as::<_, GradeRow>(
            "SELECT student_id, subject, marks, term FROM grades ORDER BY term, subject, student_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(GradeRow::to_domain).collect())
    }

    async fn record_fee_payment(
        &self,
        payment: &NewFeePayment,
        transaction_id: &str,
    ) -> PortResult<FeeTransaction> {
        let sql = format!(
            "INSERT INTO fee_transactions ({FEE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {FEE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, FeeRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(payment.student_id)
            .bind(payment.amount)
            .bind(payment.date)
            .bind(transaction_id)
            .bind(payment.payment_mode.as_deref())
            .bind(payment.remarks.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match map_db_error(e) {
                PortError::NotFound(_) => {
                    PortError::NotFound(format!("Student {} not found", payment.student_id))
                }
                other => other,
            })?;
        Ok(record.to_domain())
    }

    async fn list_fee_transactions(
        &self,
        student_id: Option<Uuid>,
    ) -> PortResult<Vec<FeeTransaction>> {
        let sql = format!(
            "SELECT {FEE_COLUMNS} FROM fee_transactions \
             WHERE ($1::uuid IS NULL OR student_id = $1) \
             ORDER BY payment_date ASC, created_at ASC"
        );
        let records = sqlx::query_as::<_, FeeRow>(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(FeeRow::to_domain).collect())
    }
}
