//! crates/school_admin_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs are independent of any database; they only carry the serde
//! derives needed for the CSV codec and the JSON boundary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Students
//=========================================================================================

/// The validated, typed attributes of a student. Everything except the storage id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFields {
    pub admission_number: String,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub admission_date: Option<NaiveDate>,
    pub aadhar_number: Option<String>,
    pub pen_number: Option<String>,
    pub aapar_id: Option<String>,
    pub mobile_number: Option<String>,
    pub address: Option<String>,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub yearly_fee_amount: Decimal,
}

impl StudentFields {
    /// A record with only the two required fields set.
    pub fn new(admission_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            admission_number: admission_number.into(),
            name: name.into(),
            date_of_birth: None,
            admission_date: None,
            aadhar_number: None,
            pen_number: None,
            aapar_id: None,
            mobile_number: None,
            address: None,
            grade: None,
            section: None,
            yearly_fee_amount: Decimal::ZERO,
        }
    }
}

/// One enrolled student as persisted.
///
/// `id` is the storage identity that fee and grade rows point at. It is decoupled
/// from `admission_number` so the business key can be corrected in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: StudentFields,
}

impl StudentRecord {
    pub fn admission_number(&self) -> &str {
        &self.fields.admission_number
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }
}

/// A partial update. `None` leaves the stored value untouched.
///
/// Optional text fields use a nested option so that a patch can clear them:
/// `Some(None)` stores NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentPatch {
    pub admission_number: Option<String>,
    pub name: Option<String>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub admission_date: Option<Option<NaiveDate>>,
    pub aadhar_number: Option<Option<String>>,
    pub pen_number: Option<Option<String>>,
    pub aapar_id: Option<Option<String>>,
    pub mobile_number: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub grade: Option<Option<String>>,
    pub section: Option<Option<String>>,
    pub yearly_fee_amount: Option<Decimal>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the patch on top of `fields`, returning the merged result.
    pub fn apply_to(&self, fields: &StudentFields) -> StudentFields {
        fn pick<T: Clone>(patch: &Option<T>, current: &T) -> T {
            patch.clone().unwrap_or_else(|| current.clone())
        }
        StudentFields {
            admission_number: pick(&self.admission_number, &fields.admission_number),
            name: pick(&self.name, &fields.name),
            date_of_birth: pick(&self.date_of_birth, &fields.date_of_birth),
            admission_date: pick(&self.admission_date, &fields.admission_date),
            aadhar_number: pick(&self.aadhar_number, &fields.aadhar_number),
            pen_number: pick(&self.pen_number, &fields.pen_number),
            aapar_id: pick(&self.aapar_id, &fields.aapar_id),
            mobile_number: pick(&self.mobile_number, &fields.mobile_number),
            address: pick(&self.address, &fields.address),
            grade: pick(&self.grade, &fields.grade),
            section: pick(&self.section, &fields.section),
            yearly_fee_amount: pick(&self.yearly_fee_amount, &fields.yearly_fee_amount),
        }
    }
}

//=========================================================================================
// Import Reconciliation
//=========================================================================================

/// Conflict policy applied when an imported admission number already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStrategy {
    /// Keep the stored record and report the admission number as skipped.
    #[default]
    Skip,
    /// Overwrite every mutable field of the stored record.
    Upsert,
}

impl fmt::Display for ImportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStrategy::Skip => f.write_str("skip"),
            ImportStrategy::Upsert => f.write_str("upsert"),
        }
    }
}

impl FromStr for ImportStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "skip" => Ok(ImportStrategy::Skip),
            "upsert" => Ok(ImportStrategy::Upsert),
            other => Err(format!("unknown import strategy '{}'", other)),
        }
    }
}

/// A row that validation dropped from a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    /// 1-based position of the row in the submitted batch.
    pub row: usize,
    pub admission_number: Option<String>,
    pub reason: String,
}

/// The outcome of one reconciliation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
    pub skipped_admission_numbers: Vec<String>,
    /// 1-based batch positions of the skipped rows, parallel to `skipped_admission_numbers`.
    pub skipped_rows: Vec<usize>,
    pub updated: usize,
    pub invalid: usize,
    pub rejected: Vec<RejectedRow>,
}

impl ImportSummary {
    /// Rows that passed validation and were classified.
    pub fn accepted(&self) -> usize {
        self.added + self.skipped + self.updated
    }
}

//=========================================================================================
// Grades
//=========================================================================================

/// Marks for one student in one subject and term. Keyed by `(student_id, subject, term)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub student_id: Uuid,
    pub subject: String,
    pub marks: Decimal,
    pub term: String,
}

/// What a single grade upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeWrite {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSaveSummary {
    pub inserted: usize,
    pub updated: usize,
    pub invalid: usize,
}

impl GradeSaveSummary {
    pub fn saved(&self) -> usize {
        self.inserted + self.updated
    }
}

//=========================================================================================
// Fees
//=========================================================================================

/// A single recorded fee payment. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTransaction {
    pub id: Uuid,
    pub student_id: Uuid,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub transaction_id: String,
    pub payment_mode: Option<String>,
    pub remarks: Option<String>,
}

/// A payment as submitted, before it is assigned ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeePayment {
    pub student_id: Uuid,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// A payment joined with the student it was paid for, as printed on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payslip {
    #[serde(flatten)]
    pub transaction: FeeTransaction,
    pub student_name: String,
    pub admission_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBalance {
    pub student_id: Uuid,
    pub yearly_fee_amount: Decimal,
    pub total_paid: Decimal,
    /// Negative when the student has overpaid.
    pub balance: Decimal,
}

//=========================================================================================
// Reports
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMarks {
    pub subject: String,
    pub marks: Decimal,
}

/// A student's marks for one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub student: StudentRecord,
    pub term: String,
    pub subjects: Vec<SubjectMarks>,
    pub total: Decimal,
    pub average: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: usize,
    pub pending_fees: Decimal,
    pub grade_entries: usize,
    pub classes_entered: usize,
}
