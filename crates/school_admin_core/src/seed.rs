//! crates/school_admin_core/src/seed.rs
//!
//! Deterministic demo data, loaded once at startup when configured.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::info;

use crate::domain::{GradeEntry, ImportStrategy, NewFeePayment};
use crate::fees::receipt_number;
use crate::grades::save_grades;
use crate::ports::{PortResult, RecordStore};
use crate::reconcile::reconcile;
use crate::validation::CandidateRecord;

const FIRST_NAMES: [&str; 10] = [
    "Aarav", "Diya", "Ishaan", "Kavya", "Rohan", "Ananya", "Vihaan", "Meera", "Arjun", "Saanvi",
];
const LAST_NAMES: [&str; 7] = ["Sharma", "Iyer", "Patel", "Reddy", "Khan", "Das", "Nair"];
const GRADES: [&str; 4] = ["9", "10", "11", "12"];
const SECTIONS: [&str; 3] = ["A", "B", "C"];
pub const SUBJECTS: [&str; 5] = ["Mathematics", "Science", "English", "History", "Geography"];
pub const TERMS: [&str; 3] = ["Term 1", "Term 2", "Final"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub students_added: usize,
    pub payments_recorded: usize,
    pub grades_saved: usize,
}

/// Candidate rows for `count` demo students, `STU001` upwards.
pub fn demo_students(count: usize) -> Vec<CandidateRecord> {
    (0..count)
        .map(|i| {
            let grade_index = i % GRADES.len();
            let fee = 20000 + 2500 * grade_index as i64;
            CandidateRecord {
                admission_number: Some(format!("STU{:03}", i + 1)),
                name: Some(format!(
                    "{} {}",
                    FIRST_NAMES[i % FIRST_NAMES.len()],
                    LAST_NAMES[(i / FIRST_NAMES.len() + i) % LAST_NAMES.len()]
                )),
                date_of_birth: Some(format!(
                    "{}-{:02}-{:02}",
                    2012 - grade_index,
                    i % 12 + 1,
                    i % 28 + 1
                )),
                admission_date: Some(format!("2023-04-{:02}", i % 28 + 1)),
                aadhar_number: Some(format!("{:012}", 400_000_000_000u64 + i as u64 * 7919)),
                pen_number: Some(format!("PEN{:07}", 1_000 + i)),
                aapar_id: None,
                mobile_number: Some(format!("98{:08}", 10_000_000 + i * 131)),
                address: Some(format!("{} Park Street, Kolkata", i + 1)),
                grade: Some(GRADES[grade_index].to_string()),
                section: Some(SECTIONS[(i / GRADES.len()) % SECTIONS.len()].to_string()),
                yearly_fee_amount: Some(fee.to_string()),
            }
        })
        .collect()
}

/// Loads `count` demo students into the store. Students already present are left
/// alone, and only newly added students receive demo payments and grades, so
/// running it again is harmless.
pub async fn seed_demo_data(store: &dyn RecordStore, count: usize) -> PortResult<SeedReport> {
    let existing: HashSet<String> = store
        .list_students()
        .await?
        .into_iter()
        .map(|s| s.fields.admission_number)
        .collect();

    let batch = demo_students(count);
    let summary = reconcile(store, &batch, ImportStrategy::Skip).await?;
    let mut report = SeedReport {
        students_added: summary.added,
        ..Default::default()
    };

    let fresh: Vec<_> = store
        .list_students()
        .await?
        .into_iter()
        .filter(|s| !existing.contains(&s.fields.admission_number))
        .filter(|s| batch.iter().any(|c| c.admission_key() == Some(s.admission_number())))
        .collect();

    let mut grades = Vec::new();
    for (i, student) in fresh.iter().enumerate() {
        // Every third student pays in full, the rest pay one instalment.
        let instalments: u32 = if i % 3 == 0 { 2 } else { 1 };
        let half = (student.fields.yearly_fee_amount / Decimal::TWO).round_dp(2);
        for n in 0..instalments {
            let Some(date) = NaiveDate::from_ymd_opt(2024, 4 + n, (i % 20) as u32 + 1) else {
                continue;
            };
            let payment = NewFeePayment {
                student_id: student.id,
                amount: half,
                date,
                payment_mode: Some(if n == 0 { "cash" } else { "upi" }.to_string()),
                remarks: None,
            };
            store
                .record_fee_payment(&payment, &receipt_number(date, uuid::Uuid::new_v4()))
                .await?;
            report.payments_recorded += 1;
        }
        for (s, subject) in SUBJECTS.iter().enumerate() {
            grades.push(GradeEntry {
                student_id: student.id,
                subject: subject.to_string(),
                marks: Decimal::from(35 + ((i * 17 + s * 11) % 66) as i64),
                term: TERMS[0].to_string(),
            });
        }
    }
    report.grades_saved = save_grades(store, &grades).await?.saved();

    info!(
        students = report.students_added,
        payments = report.payments_recorded,
        grades = report.grades_saved,
        "Demo data seeded"
    );
    Ok(report)
}
