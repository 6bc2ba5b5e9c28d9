//! crates/school_admin_core/src/validation.rs
//!
//! Turns loosely-typed incoming student rows into validated `StudentFields`.
//!
//! Every row is judged on its own: a bad row yields `RowOutcome::Invalid` with a
//! reason and never an error that could escape the row boundary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{StudentFields, StudentPatch};

/// Date layouts accepted on input, tried in order.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y%m%d", "%d/%m/%Y", "%d-%m-%Y"];

//=========================================================================================
// Raw Input
//=========================================================================================

/// One incoming student row exactly as submitted, before any validation.
///
/// Every field is optional and accepts a JSON string, number, boolean or null so
/// that spreadsheets exported with numeric admission numbers still import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub admission_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date_of_birth: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub admission_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub aadhar_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub pen_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub aapar_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mobile_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub grade: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub section: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub yearly_fee_amount: Option<String>,
}

impl CandidateRecord {
    /// The trimmed admission number, if the row carries a non-empty one.
    pub fn admission_key(&self) -> Option<&str> {
        self.admission_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl From<&StudentFields> for CandidateRecord {
    fn from(fields: &StudentFields) -> Self {
        Self {
            admission_number: Some(fields.admission_number.clone()),
            name: Some(fields.name.clone()),
            date_of_birth: fields.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            admission_date: fields.admission_date.map(|d| d.format("%Y-%m-%d").to_string()),
            aadhar_number: fields.aadhar_number.clone(),
            pen_number: fields.pen_number.clone(),
            aapar_id: fields.aapar_id.clone(),
            mobile_number: fields.mobile_number.clone(),
            address: fields.address.clone(),
            grade: fields.grade.clone(),
            section: fields.section.clone(),
            yearly_fee_amount: Some(fields.yearly_fee_amount.to_string()),
        }
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientText;

    impl<'de> Visitor<'de> for LenientText {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string, number, boolean or null")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<Self::Value, D2::Error> {
            d.deserialize_any(LenientText)
        }
    }

    deserializer.deserialize_any(LenientText)
}

//=========================================================================================
// Validation Result
//=========================================================================================

/// Why a row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRow {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is not a recognised date: '{value}'")]
    InvalidDate { field: &'static str, value: String },
    #[error("field 'yearlyFeeAmount' is not a number: '{0}'")]
    InvalidAmount(String),
    #[error("field 'yearlyFeeAmount' must not be negative: {0}")]
    NegativeAmount(Decimal),
    #[error("field 'yearlyFeeAmount' must have at most two decimal places and not exceed 99999999.99: {0}")]
    AmountOutOfRange(Decimal),
    /// The row could not be read as a student record at all.
    #[error("row is not a readable student record: {0}")]
    Malformed(String),
}

/// One element of a submitted batch: a readable row, or why it could not be read.
pub type BatchRow = Result<CandidateRecord, InvalidRow>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Valid(StudentFields),
    Invalid(InvalidRow),
}

impl RowOutcome {
    pub fn into_result(self) -> Result<StudentFields, InvalidRow> {
        match self {
            RowOutcome::Valid(fields) => Ok(fields),
            RowOutcome::Invalid(reason) => Err(reason),
        }
    }
}

//=========================================================================================
// Validators
//=========================================================================================

/// Validates one candidate row for insert or full overwrite.
pub fn validate_candidate(candidate: &CandidateRecord) -> RowOutcome {
    match build_fields(candidate) {
        Ok(fields) => RowOutcome::Valid(fields),
        Err(reason) => RowOutcome::Invalid(reason),
    }
}

fn build_fields(c: &CandidateRecord) -> Result<StudentFields, InvalidRow> {
    let admission_number =
        optional(&c.admission_number).ok_or(InvalidRow::MissingField("admissionNumber"))?;
    let name = optional(&c.name).ok_or(InvalidRow::MissingField("name"))?;

    let yearly_fee_amount = match optional(&c.yearly_fee_amount) {
        Some(raw) => parse_amount(&raw)?,
        None => Decimal::ZERO,
    };

    Ok(StudentFields {
        admission_number,
        name,
        date_of_birth: optional_date(&c.date_of_birth, "dateOfBirth")?,
        admission_date: optional_date(&c.admission_date, "admissionDate")?,
        aadhar_number: optional(&c.aadhar_number),
        pen_number: optional(&c.pen_number),
        aapar_id: optional(&c.aapar_id),
        mobile_number: optional(&c.mobile_number),
        address: optional(&c.address),
        grade: optional(&c.grade),
        section: optional(&c.section),
        yearly_fee_amount,
    })
}

/// Validates a partial update.
///
/// Absent (or null) fields stay untouched. An empty string clears an optional
/// field; it is an error for `admissionNumber` and `name`. An empty
/// `yearlyFeeAmount` leaves the fee unchanged.
pub fn validate_patch(c: &CandidateRecord) -> Result<StudentPatch, InvalidRow> {
    let admission_number = match &c.admission_number {
        Some(_) => Some(
            optional(&c.admission_number).ok_or(InvalidRow::MissingField("admissionNumber"))?,
        ),
        None => None,
    };
    let name = match &c.name {
        Some(_) => Some(optional(&c.name).ok_or(InvalidRow::MissingField("name"))?),
        None => None,
    };
    let clearable = |v: &Option<String>| v.as_ref().map(|_| optional(v));
    let date = |v: &Option<String>, field: &'static str| -> Result<Option<Option<NaiveDate>>, InvalidRow> {
        match v {
            Some(_) => optional_date(v, field).map(Some),
            None => Ok(None),
        }
    };
    let yearly_fee_amount = match optional(&c.yearly_fee_amount) {
        Some(raw) => Some(parse_amount(&raw)?),
        None => None,
    };

    Ok(StudentPatch {
        admission_number,
        name,
        date_of_birth: date(&c.date_of_birth, "dateOfBirth")?,
        admission_date: date(&c.admission_date, "admissionDate")?,
        aadhar_number: clearable(&c.aadhar_number),
        pen_number: clearable(&c.pen_number),
        aapar_id: clearable(&c.aapar_id),
        mobile_number: clearable(&c.mobile_number),
        address: clearable(&c.address),
        grade: clearable(&c.grade),
        section: clearable(&c.section),
        yearly_fee_amount,
    })
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn optional_date(
    value: &Option<String>,
    field: &'static str,
) -> Result<Option<NaiveDate>, InvalidRow> {
    match optional(value) {
        Some(raw) => parse_date(&raw)
            .map(Some)
            .ok_or(InvalidRow::InvalidDate { field, value: raw }),
        None => Ok(None),
    }
}

/// Parses a date in any of the accepted layouts.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Parses a non-negative money amount. Thousands separators and a rupee sign are ignored.
pub fn parse_amount(raw: &str) -> Result<Decimal, InvalidRow> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('₹')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let amount =
        Decimal::from_str(&cleaned).map_err(|_| InvalidRow::InvalidAmount(raw.to_string()))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(InvalidRow::NegativeAmount(amount));
    }
    if !fits_money_column(amount) {
        return Err(InvalidRow::AmountOutOfRange(amount));
    }
    Ok(amount)
}

/// Whether `amount` can be stored as money: at most two decimal places and no
/// more than 99,999,999.99 either way.
pub fn fits_money_column(amount: Decimal) -> bool {
    amount.normalize().scale() <= 2 && amount.abs() <= Decimal::new(9_999_999_999, 2)
}
