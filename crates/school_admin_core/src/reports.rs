//! crates/school_admin_core/src/reports.rs
//!
//! Report cards and dashboard figures. Pure functions over store listings.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

use crate::domain::{
    DashboardStats, FeeTransaction, GradeEntry, ReportCard, StudentRecord, SubjectMarks,
};
use crate::fees::fee_balance;

/// Builds the report card of `student` for `term`. The average is rounded to two places.
pub fn report_card(student: &StudentRecord, grades: &[GradeEntry], term: &str) -> ReportCard {
    let mut subjects: Vec<SubjectMarks> = grades
        .iter()
        .filter(|g| g.student_id == student.id && g.term == term)
        .map(|g| SubjectMarks {
            subject: g.subject.clone(),
            marks: g.marks,
        })
        .collect();
    subjects.sort_by(|a, b| a.subject.cmp(&b.subject));

    let total: Decimal = subjects.iter().map(|s| s.marks).sum();
    let average = if subjects.is_empty() {
        Decimal::ZERO
    } else {
        (total / Decimal::from(subjects.len())).round_dp(2)
    };

    ReportCard {
        student: student.clone(),
        term: term.to_string(),
        subjects,
        total,
        average,
    }
}

pub fn dashboard_stats(
    students: &[StudentRecord],
    grades: &[GradeEntry],
    transactions: &[FeeTransaction],
) -> DashboardStats {
    let mut by_student: HashMap<_, Vec<FeeTransaction>> = HashMap::new();
    for t in transactions {
        by_student.entry(t.student_id).or_default().push(t.clone());
    }
    let pending_fees: Decimal = students
        .iter()
        .map(|s| {
            let paid = by_student.get(&s.id).map(Vec::as_slice).unwrap_or_default();
            fee_balance(s, paid).balance
        })
        .filter(|b| *b > Decimal::ZERO)
        .sum();

    let classes: HashMap<_, _> = students
        .iter()
        .map(|s| (s.id, (s.fields.grade.as_deref(), s.fields.section.as_deref())))
        .collect();
    let classes_entered: HashSet<_> = grades
        .iter()
        .filter_map(|g| {
            classes
                .get(&g.student_id)
                .map(|(grade, section)| (*grade, *section, g.subject.as_str(), g.term.as_str()))
        })
        .collect();

    DashboardStats {
        total_students: students.len(),
        pending_fees,
        grade_entries: grades.len(),
        classes_entered: classes_entered.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StudentFields;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn student(key: &str, grade: &str, section: &str, fee: i64) -> StudentRecord {
        let mut fields = StudentFields::new(key, key);
        fields.grade = Some(grade.into());
        fields.section = Some(section.into());
        fields.yearly_fee_amount = Decimal::new(fee, 0);
        StudentRecord {
            id: Uuid::new_v4(),
            fields,
        }
    }

    fn grade(student_id: Uuid, subject: &str, marks: i64, term: &str) -> GradeEntry {
        GradeEntry {
            student_id,
            subject: subject.into(),
            marks: Decimal::new(marks, 0),
            term: term.into(),
        }
    }

    #[test]
    fn report_card_totals_and_averages_one_term() {
        let s = student("STU001", "10", "A", 0);
        let grades = vec![
            grade(s.id, "Science", 80, "Term 1"),
            grade(s.id, "English", 75, "Term 1"),
            grade(s.id, "History", 66, "Term 1"),
            grade(s.id, "Science", 10, "Term 2"),
        ];

        let card = report_card(&s, &grades, "Term 1");

        assert_eq!(card.subjects.len(), 3);
        assert_eq!(card.subjects[0].subject, "English");
        assert_eq!(card.total, Decimal::new(221, 0));
        assert_eq!(card.average, Decimal::new(7367, 2));
    }

    #[test]
    fn empty_report_card_has_zero_average() {
        let s = student("STU001", "10", "A", 0);
        let card = report_card(&s, &[], "Final");
        assert!(card.subjects.is_empty());
        assert_eq!(card.average, Decimal::ZERO);
    }

    #[test]
    fn dashboard_sums_only_outstanding_balances() {
        let a = student("STU001", "10", "A", 25000);
        let b = student("STU002", "10", "B", 10000);
        let pay = |student_id, amount| FeeTransaction {
            id: Uuid::new_v4(),
            student_id,
            amount: Decimal::new(amount, 0),
            date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            transaction_id: "TXN".into(),
            payment_mode: None,
            remarks: None,
        };
        let transactions = vec![pay(a.id, 5000), pay(b.id, 12000)];
        let grades = vec![
            grade(a.id, "Science", 50, "Term 1"),
            grade(b.id, "Science", 60, "Term 1"),
            grade(b.id, "English", 60, "Term 1"),
        ];

        let stats = dashboard_stats(&[a, b], &grades, &transactions);

        assert_eq!(stats.total_students, 2);
        assert_eq!(stats.pending_fees, Decimal::new(20000, 0));
        assert_eq!(stats.grade_entries, 3);
        assert_eq!(stats.classes_entered, 3);
    }
}
