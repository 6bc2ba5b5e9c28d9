//! crates/school_admin_core/src/fees.rs
//!
//! Fee payments and balances.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::domain::{FeeBalance, FeeTransaction, NewFeePayment, Payslip, StudentRecord};
use crate::ports::{PortError, PortResult, RecordStore};
use crate::validation::fits_money_column;

/// The receipt number printed on a payslip: `TXN-<yyyymmdd>-<8 hex>`.
pub fn receipt_number(date: NaiveDate, nonce: Uuid) -> String {
    let hex = nonce.simple().to_string();
    format!("TXN-{}-{}", date.format("%Y%m%d"), hex[..8].to_uppercase())
}

/// Records a payment and returns the payslip for it.
pub async fn record_payment(store: &dyn RecordStore, payment: NewFeePayment) -> PortResult<Payslip> {
    if payment.amount <= Decimal::ZERO {
        return Err(PortError::Validation(format!(
            "payment amount must be positive, got {}",
            payment.amount
        )));
    }
    if !fits_money_column(payment.amount) {
        return Err(PortError::Validation(format!(
            "payment amount must have at most two decimal places and not exceed 99999999.99, got {}",
            payment.amount
        )));
    }
    let student = store
        .find_student_by_id(payment.student_id)
        .await?
        .ok_or_else(|| PortError::NotFound(format!("Student {} not found", payment.student_id)))?;

    let payment = NewFeePayment {
        payment_mode: payment.payment_mode.filter(|m| !m.trim().is_empty()),
        remarks: payment.remarks.filter(|r| !r.trim().is_empty()),
        ..payment
    };
    let receipt = receipt_number(payment.date, Uuid::new_v4());
    let transaction = store.record_fee_payment(&payment, &receipt).await?;
    info!(
        admission_number = %student.fields.admission_number,
        amount = %transaction.amount,
        receipt = %transaction.transaction_id,
        "Fee payment recorded"
    );
    Ok(payslip(&student, transaction))
}

pub fn payslip(student: &StudentRecord, transaction: FeeTransaction) -> Payslip {
    Payslip {
        transaction,
        student_name: student.fields.name.clone(),
        admission_number: student.fields.admission_number.clone(),
    }
}

/// `yearly_fee_amount - sum(payments)`. Negative when overpaid.
///
/// Only transactions belonging to `student` are counted.
pub fn fee_balance(student: &StudentRecord, transactions: &[FeeTransaction]) -> FeeBalance {
    let total_paid: Decimal = transactions
        .iter()
        .filter(|t| t.student_id == student.id)
        .map(|t| t.amount)
        .sum();
    FeeBalance {
        student_id: student.id,
        yearly_fee_amount: student.fields.yearly_fee_amount,
        total_paid,
        balance: student.fields.yearly_fee_amount - total_paid,
    }
}

pub async fn balance_for(store: &dyn RecordStore, student_id: Uuid) -> PortResult<FeeBalance> {
    let student = store
        .find_student_by_id(student_id)
        .await?
        .ok_or_else(|| PortError::NotFound(format!("Student {} not found", student_id)))?;
    let transactions = store.list_fee_transactions(Some(student_id)).await?;
    Ok(fee_balance(&student, &transactions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StudentFields;
    use crate::memory::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn payment(student_id: Uuid, amount: i64) -> NewFeePayment {
        NewFeePayment {
            student_id,
            amount: Decimal::new(amount, 0),
            date: date(2024, 7, 1),
            payment_mode: Some("cash".into()),
            remarks: Some("  ".into()),
        }
    }

    #[tokio::test]
    async fn overpayment_yields_negative_balance() {
        let store = MemoryStore::new();
        let mut fields = StudentFields::new("STU001", "A");
        fields.yearly_fee_amount = Decimal::new(25000, 0);
        let student = store.create_student(&fields).await.unwrap();

        record_payment(&store, payment(student.id, 20000)).await.unwrap();
        record_payment(&store, payment(student.id, 10000)).await.unwrap();

        let balance = balance_for(&store, student.id).await.unwrap();
        assert_eq!(balance.total_paid, Decimal::new(30000, 0));
        assert_eq!(balance.balance, Decimal::new(-5000, 0));
    }

    #[tokio::test]
    async fn payslip_carries_student_and_receipt() {
        let store = MemoryStore::new();
        let student = store
            .create_student(&StudentFields::new("STU007", "Meera"))
            .await
            .unwrap();

        let slip = record_payment(&store, payment(student.id, 1500)).await.unwrap();

        assert_eq!(slip.student_name, "Meera");
        assert_eq!(slip.admission_number, "STU007");
        assert!(slip.transaction.transaction_id.starts_with("TXN-20240701-"));
        assert_eq!(slip.transaction.transaction_id.len(), "TXN-20240701-".len() + 8);
        assert_eq!(slip.transaction.remarks, None);
        assert_eq!(slip.transaction.payment_mode.as_deref(), Some("cash"));
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected() {
        let store = MemoryStore::new();
        let student = store
            .create_student(&StudentFields::new("STU001", "A"))
            .await
            .unwrap();
        let err = record_payment(&store, payment(student.id, 0)).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[tokio::test]
    async fn unstorable_amounts_are_rejected() {
        let store = MemoryStore::new();
        let student = store
            .create_student(&StudentFields::new("STU001", "A"))
            .await
            .unwrap();

        let mut tiny = payment(student.id, 0);
        tiny.amount = Decimal::new(1, 3);
        let err = record_payment(&store, tiny).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));

        let huge = payment(student.id, 100_000_000);
        let err = record_payment(&store, huge).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));

        assert!(store.list_fee_transactions(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_student_is_not_found() {
        let store = MemoryStore::new();
        let err = record_payment(&store, payment(Uuid::new_v4(), 100))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[test]
    fn balance_ignores_other_students() {
        let student = StudentRecord {
            id: Uuid::new_v4(),
            fields: StudentFields::new("STU001", "A"),
        };
        let other = FeeTransaction {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            amount: Decimal::new(500, 0),
            date: date(2024, 1, 1),
            transaction_id: "TXN-x".into(),
            payment_mode: None,
            remarks: None,
        };
        let balance = fee_balance(&student, &[other]);
        assert_eq!(balance.total_paid, Decimal::ZERO);
        assert_eq!(balance.balance, Decimal::ZERO);
    }
}
