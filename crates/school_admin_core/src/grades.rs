//! crates/school_admin_core/src/grades.rs
//!
//! Bulk grade upsert and marks-sheet resolution.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use crate::domain::{GradeEntry, GradeSaveSummary, GradeWrite, StudentRecord};
use crate::ports::{PortResult, RecordStore};

const MAX_MARKS: Decimal = Decimal::ONE_HUNDRED;

/// Saves a batch of grades in one transaction.
///
/// Each entry overwrites the marks stored under its `(student, subject, term)` key
/// or inserts a new row. Entries with out-of-range marks, blank subject or term,
/// or an unknown student are left out and counted as invalid.
pub async fn save_grades(
    store: &dyn RecordStore,
    entries: &[GradeEntry],
) -> PortResult<GradeSaveSummary> {
    let mut tx = store.begin().await?;
    let mut summary = GradeSaveSummary::default();

    for entry in entries {
        let Some(entry) = normalize(entry) else {
            debug!(student_id = %entry.student_id, "Dropping malformed grade entry");
            summary.invalid += 1;
            continue;
        };
        if !tx.student_exists(entry.student_id).await? {
            debug!(student_id = %entry.student_id, "Dropping grade for unknown student");
            summary.invalid += 1;
            continue;
        }
        match tx.upsert_grade(&entry).await? {
            GradeWrite::Inserted => summary.inserted += 1,
            GradeWrite::Updated => summary.updated += 1,
        }
    }

    tx.commit().await?;
    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        invalid = summary.invalid,
        "Grades saved"
    );
    Ok(summary)
}

fn normalize(entry: &GradeEntry) -> Option<GradeEntry> {
    let subject = entry.subject.trim();
    let term = entry.term.trim();
    if subject.is_empty() || term.is_empty() {
        return None;
    }
    if entry.marks < Decimal::ZERO
        || entry.marks > MAX_MARKS
        || entry.marks.normalize().scale() > 2
    {
        return None;
    }
    Some(GradeEntry {
        student_id: entry.student_id,
        subject: subject.to_string(),
        marks: entry.marks,
        term: term.to_string(),
    })
}

/// Students of one class, optionally narrowed to a section. `None` matches everything.
pub fn class_roster<'a>(
    students: &'a [StudentRecord],
    grade: Option<&str>,
    section: Option<&str>,
) -> Vec<&'a StudentRecord> {
    students
        .iter()
        .filter(|s| grade.map_or(true, |g| s.fields.grade.as_deref() == Some(g)))
        .filter(|s| section.map_or(true, |sec| s.fields.section.as_deref() == Some(sec)))
        .collect()
}

//=========================================================================================
// Marks Sheets
//=========================================================================================

/// One row of an uploaded marks sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarksRow {
    pub admission_number: String,
    pub name: Option<String>,
    pub marks: Option<String>,
}

/// A marks sheet matched against a class roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksSheet {
    pub entries: Vec<GradeEntry>,
    pub unknown_admission_numbers: Vec<String>,
    pub unreadable_admission_numbers: Vec<String>,
}

/// Resolves admission numbers on a marks sheet to student ids for one subject and term.
///
/// Blank marks count as zero. Rows whose admission number is not on the roster are
/// listed in `unknown_admission_numbers`; rows whose marks are not a number are
/// listed in `unreadable_admission_numbers`.
pub fn resolve_marks_sheet(
    rows: &[MarksRow],
    roster: &[&StudentRecord],
    subject: &str,
    term: &str,
) -> MarksSheet {
    let mut sheet = MarksSheet::default();
    for row in rows {
        let Some(student) = roster
            .iter()
            .find(|s| s.admission_number() == row.admission_number)
        else {
            sheet.unknown_admission_numbers.push(row.admission_number.clone());
            continue;
        };
        let marks = match row.marks.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            None => Decimal::ZERO,
            Some(raw) => match Decimal::from_str(raw) {
                Ok(marks) => marks,
                Err(_) => {
                    sheet.unreadable_admission_numbers.push(row.admission_number.clone());
                    continue;
                }
            },
        };
        sheet.entries.push(GradeEntry {
            student_id: student.id,
            subject: subject.to_string(),
            marks,
            term: term.to_string(),
        });
    }
    sheet
}
