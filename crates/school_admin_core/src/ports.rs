//! crates/school_admin_core/src/ports.rs
//!
//! Defines the storage contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! reconciliation and grading logic to run against Postgres or memory alike.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    FeeTransaction, GradeEntry, GradeWrite, NewFeePayment, StudentFields, StudentPatch,
    StudentRecord,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., the database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    /// A store-level fault. Aborts whatever transaction it occurred in.
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

/// One open unit of work. Nothing it writes is visible to other callers until
/// `commit`; dropping it without committing rolls everything back.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_student_by_admission_number(
        &mut self,
        admission_number: &str,
    ) -> PortResult<Option<StudentRecord>>;

    /// Inserts a new student with a freshly generated id.
    /// Returns `PortError::Conflict` when the admission number is already taken.
    async fn insert_student(&mut self, fields: &StudentFields) -> PortResult<StudentRecord>;

    /// Overwrites every mutable field of the student keyed by `admission_number`.
    /// The admission number and storage id are left as they are.
    async fn update_student_by_admission_number(
        &mut self,
        admission_number: &str,
        fields: &StudentFields,
    ) -> PortResult<StudentRecord>;

    async fn student_exists(&mut self, student_id: Uuid) -> PortResult<bool>;

    /// Inserts or overwrites the marks keyed by `(student_id, subject, term)`.
    async fn upsert_grade(&mut self, entry: &GradeEntry) -> PortResult<GradeWrite>;

    async fn commit(self: Box<Self>) -> PortResult<()>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>>;

    // --- Students ---
    /// All students ordered by admission number.
    async fn list_students(&self) -> PortResult<Vec<StudentRecord>>;

    async fn find_student_by_admission_number(
        &self,
        admission_number: &str,
    ) -> PortResult<Option<StudentRecord>>;

    async fn find_student_by_id(&self, student_id: Uuid) -> PortResult<Option<StudentRecord>>;

    async fn create_student(&self, fields: &StudentFields) -> PortResult<StudentRecord>;

    async fn update_student(
        &self,
        admission_number: &str,
        patch: &StudentPatch,
    ) -> PortResult<StudentRecord>;

    /// Deletes a student and, with it, their fee and grade rows.
    /// Returns `false` when no student had that id.
    async fn delete_student_by_id(&self, student_id: Uuid) -> PortResult<bool>;

    // --- Grades ---
    async fn list_grades(&self) -> PortResult<Vec<GradeEntry>>;

    // --- Fees ---
    async fn record_fee_payment(
        &self,
        payment: &NewFeePayment,
        transaction_id: &str,
    ) -> PortResult<FeeTransaction>;

    /// Payments ordered by date, then by when they were recorded, optionally only
    /// those of one student.
    async fn list_fee_transactions(
        &self,
        student_id: Option<Uuid>,
    ) -> PortResult<Vec<FeeTransaction>>;
}
