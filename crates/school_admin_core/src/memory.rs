//! crates/school_admin_core/src/memory.rs
//!
//! An in-process implementation of the `RecordStore` port.
//!
//! Used for local runs without Postgres and as the store behind the test suites.
//! Writers are serialized: a transaction holds the store lock from `begin` until it
//! is committed or dropped, and works on a private copy that `commit` swaps in.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    FeeTransaction, GradeEntry, GradeWrite, NewFeePayment, StudentFields, StudentPatch,
    StudentRecord,
};
use crate::ports::{PortError, PortResult, RecordStore, StoreTransaction};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    students: Vec<StudentRecord>,
    grades: Vec<GradeEntry>,
    fees: Vec<FeeTransaction>,
}

impl MemoryState {
    fn student_by_key(&self, admission_number: &str) -> Option<&StudentRecord> {
        self.students
            .iter()
            .find(|s| s.admission_number() == admission_number)
    }

    fn insert_student(&mut self, fields: &StudentFields) -> PortResult<StudentRecord> {
        if self.student_by_key(&fields.admission_number).is_some() {
            return Err(PortError::Conflict(format!(
                "admission number {} already exists",
                fields.admission_number
            )));
        }
        let record = StudentRecord {
            id: Uuid::new_v4(),
            fields: fields.clone(),
        };
        self.students.push(record.clone());
        Ok(record)
    }

    fn overwrite_student(
        &mut self,
        admission_number: &str,
        fields: StudentFields,
    ) -> PortResult<StudentRecord> {
        if fields.admission_number != admission_number
            && self.student_by_key(&fields.admission_number).is_some()
        {
            return Err(PortError::Conflict(format!(
                "admission number {} already exists",
                fields.admission_number
            )));
        }
        let record = self
            .students
            .iter_mut()
            .find(|s| s.admission_number() == admission_number)
            .ok_or_else(|| PortError::NotFound(format!("Student {} not found", admission_number)))?;
        record.fields = fields;
        Ok(record.clone())
    }

    fn upsert_grade(&mut self, entry: &GradeEntry) -> GradeWrite {
        match self.grades.iter_mut().find(|g| {
            g.student_id == entry.student_id && g.subject == entry.subject && g.term == entry.term
        }) {
            Some(existing) => {
                existing.marks = entry.marks;
                GradeWrite::Updated
            }
            None => {
                self.grades.push(entry.clone());
                GradeWrite::Inserted
            }
        }
    }
}

//=========================================================================================
// The Store
//=========================================================================================

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_student_by_admission_number(
        &mut self,
        admission_number: &str,
    ) -> PortResult<Option<StudentRecord>> {
        Ok(self.working.student_by_key(admission_number).cloned())
    }

    async fn insert_student(&mut self, fields: &StudentFields) -> PortResult<StudentRecord> {
        self.working.insert_student(fields)
    }

    async fn update_student_by_admission_number(
        &mut self,
        admission_number: &str,
        fields: &StudentFields,
    ) -> PortResult<StudentRecord> {
        let mut fields = fields.clone();
        fields.admission_number = admission_number.to_string();
        self.working.overwrite_student(admission_number, fields)
    }

    async fn student_exists(&mut self, student_id: Uuid) -> PortResult<bool> {
        Ok(self.working.students.iter().any(|s| s.id == student_id))
    }

    async fn upsert_grade(&mut self, entry: &GradeEntry) -> PortResult<GradeWrite> {
        Ok(self.working.upsert_grade(entry))
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn list_students(&self) -> PortResult<Vec<StudentRecord>> {
        let mut students = self.state.lock().await.students.clone();
        students.sort_by(|a, b| a.admission_number().cmp(b.admission_number()));
        Ok(students)
    }

    async fn find_student_by_admission_number(
        &self,
        admission_number: &str,
    ) -> PortResult<Option<StudentRecord>> {
        Ok(self.state.lock().await.student_by_key(admission_number).cloned())
    }

    async fn find_student_by_id(&self, student_id: Uuid) -> PortResult<Option<StudentRecord>> {
        let state = self.state.lock().await;
        Ok(state.students.iter().find(|s| s.id == student_id).cloned())
    }

    async fn create_student(&self, fields: &StudentFields) -> PortResult<StudentRecord> {
        self.state.lock().await.insert_student(fields)
    }

    async fn update_student(
        &self,
        admission_number: &str,
        patch: &StudentPatch,
    ) -> PortResult<StudentRecord> {
        let mut state = self.state.lock().await;
        let current = state
            .student_by_key(admission_number)
            .ok_or_else(|| PortError::NotFound(format!("Student {} not found", admission_number)))?;
        let merged = patch.apply_to(&current.fields);
        state.overwrite_student(admission_number, merged)
    }

    async fn delete_student_by_id(&self, student_id: Uuid) -> PortResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.students.len();
        state.students.retain(|s| s.id != student_id);
        if state.students.len() == before {
            return Ok(false);
        }
        state.grades.retain(|g| g.student_id != student_id);
        state.fees.retain(|f| f.student_id != student_id);
        Ok(true)
    }

    async fn list_grades(&self) -> PortResult<Vec<GradeEntry>> {
        Ok(self.state.lock().await.grades.clone())
    }

    async fn record_fee_payment(
        &self,
        payment: &NewFeePayment,
        transaction_id: &str,
    ) -> PortResult<FeeTransaction> {
        let mut state = self.state.lock().await;
        if !state.students.iter().any(|s| s.id == payment.student_id) {
            return Err(PortError::NotFound(format!(
                "Student {} not found",
                payment.student_id
            )));
        }
        let transaction = FeeTransaction {
            id: Uuid::new_v4(),
            student_id: payment.student_id,
            amount: payment.amount,
            date: payment.date,
            transaction_id: transaction_id.to_string(),
            payment_mode: payment.payment_mode.clone(),
            remarks: payment.remarks.clone(),
        };
        state.fees.push(transaction.clone());
        Ok(transaction)
    }

    async fn list_fee_transactions(
        &self,
        student_id: Option<Uuid>,
    ) -> PortResult<Vec<FeeTransaction>> {
        let state = self.state.lock().await;
        let mut fees: Vec<FeeTransaction> = state
            .fees
            .iter()
            .filter(|f| student_id.map_or(true, |id| f.student_id == id))
            .cloned()
            .collect();
        fees.sort_by_key(|t| t.date);
        Ok(fees)
    }
}
