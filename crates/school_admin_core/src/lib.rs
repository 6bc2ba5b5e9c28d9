pub mod csv_codec;
pub mod domain;
pub mod fees;
pub mod grades;
pub mod memory;
pub mod ports;
pub mod reconcile;
pub mod reports;
pub mod seed;
pub mod validation;

pub use domain::{
    DashboardStats, FeeBalance, FeeTransaction, GradeEntry, GradeSaveSummary, GradeWrite,
    ImportStrategy, ImportSummary, NewFeePayment, Payslip, RejectedRow, ReportCard,
    StudentFields, StudentPatch, StudentRecord, SubjectMarks,
};
pub use memory::MemoryStore;
pub use ports::{PortError, PortResult, RecordStore, StoreTransaction};
pub use reconcile::{reconcile, reconcile_rows, skipped_rows};
pub use validation::{
    validate_candidate, validate_patch, BatchRow, CandidateRecord, InvalidRow, RowOutcome,
};
