//! crates/school_admin_core/src/reconcile.rs
//!
//! The import reconciler: merges a batch of candidate student rows into the
//! store keyed by admission number, under a skip or upsert conflict policy.

use tracing::{debug, info, warn};

use crate::domain::{ImportStrategy, ImportSummary, RejectedRow};
use crate::ports::{PortError, PortResult, RecordStore};
use crate::validation::{validate_candidate, BatchRow, CandidateRecord};

/// Reconciles `batch` against the store inside a single transaction.
///
/// Rows are handled in input order, so a repeated admission number later in the
/// batch conflicts with the copy inserted earlier in the same call. Invalid rows
/// are reported in `rejected` and never counted as added, skipped or updated.
/// Any store fault aborts the call and nothing is committed.
pub async fn reconcile(
    store: &dyn RecordStore,
    batch: &[CandidateRecord],
    strategy: ImportStrategy,
) -> PortResult<ImportSummary> {
    let rows: Vec<BatchRow> = batch.iter().cloned().map(Ok).collect();
    reconcile_rows(store, &rows, strategy).await
}

/// Like [`reconcile`], for a batch where some elements could not be read as rows.
///
/// An unreadable element is rejected at its position like any other invalid row.
pub async fn reconcile_rows(
    store: &dyn RecordStore,
    batch: &[BatchRow],
    strategy: ImportStrategy,
) -> PortResult<ImportSummary> {
    let mut tx = store.begin().await?;
    let mut summary = ImportSummary::default();

    for (index, row) in batch.iter().enumerate() {
        let outcome = match row {
            Ok(candidate) => validate_candidate(candidate).into_result(),
            Err(reason) => Err(reason.clone()),
        };
        let fields = match outcome {
            Ok(fields) => fields,
            Err(reason) => {
                debug!(row = index + 1, %reason, "Dropping invalid import row");
                summary.invalid += 1;
                summary.rejected.push(RejectedRow {
                    row: index + 1,
                    admission_number: row
                        .as_ref()
                        .ok()
                        .and_then(CandidateRecord::admission_key)
                        .map(str::to_string),
                    reason: reason.to_string(),
                });
                continue;
            }
        };

        let existing = tx
            .find_student_by_admission_number(&fields.admission_number)
            .await?;

        match (existing, strategy) {
            (None, _) => match tx.insert_student(&fields).await {
                Ok(_) => summary.added += 1,
                Err(PortError::Conflict(_)) => {
                    // Inserted by a concurrent import after our lookup.
                    warn!(
                        admission_number = %fields.admission_number,
                        "Admission number claimed concurrently; treating row as skipped"
                    );
                    summary.skipped += 1;
                    summary.skipped_admission_numbers.push(fields.admission_number);
                    summary.skipped_rows.push(index + 1);
                }
                Err(e) => return Err(e),
            },
            (Some(_), ImportStrategy::Skip) => {
                summary.skipped += 1;
                summary.skipped_admission_numbers.push(fields.admission_number);
                summary.skipped_rows.push(index + 1);
            }
            (Some(record), ImportStrategy::Upsert) => {
                tx.update_student_by_admission_number(record.admission_number(), &fields)
                    .await?;
                summary.updated += 1;
            }
        }
    }

    tx.commit().await?;

    info!(
        %strategy,
        rows = batch.len(),
        added = summary.added,
        skipped = summary.skipped,
        updated = summary.updated,
        invalid = summary.invalid,
        "Student import reconciled"
    );
    Ok(summary)
}

/// The rows of `batch` that were skipped, in batch order.
///
/// This is the second step of the two-phase import: the caller shows the skipped
/// numbers to an operator and re-submits exactly these rows with `Upsert`. Rows are
/// picked by position, so the first copy of an in-batch duplicate, which was
/// added, is not sent again.
pub fn skipped_rows<T: Clone>(batch: &[T], summary: &ImportSummary) -> Vec<T> {
    summary
        .skipped_rows
        .iter()
        .filter_map(|row| row.checked_sub(1).and_then(|index| batch.get(index)))
        .cloned()
        .collect()
}
