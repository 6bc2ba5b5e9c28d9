//! crates/school_admin_core/src/csv_codec.rs
//!
//! Reading and writing the student and marks-sheet CSV files.
//!
//! Columns are matched by header name (case-insensitive), so files with
//! reordered or missing optional columns still import.

use std::collections::HashMap;

use csv::StringRecord;

use crate::domain::StudentRecord;
use crate::grades::MarksRow;
use crate::validation::CandidateRecord;

pub const STUDENT_HEADERS: [&str; 12] = [
    "admissionNumber",
    "name",
    "dateOfBirth",
    "admissionDate",
    "aadharNumber",
    "penNumber",
    "aaparId",
    "mobileNumber",
    "address",
    "grade",
    "section",
    "yearlyFeeAmount",
];

pub const MARKS_HEADERS: [&str; 3] = ["admissionNumber", "name", "marks"];

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV is missing the required column '{0}'")]
    MissingColumn(&'static str),
    #[error("CSV write error: {0}")]
    Write(String),
}

//=========================================================================================
// Reading
//=========================================================================================

struct HeaderMap(HashMap<String, usize>);

impl HeaderMap {
    fn new(headers: &StringRecord) -> Self {
        Self(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
                .collect(),
        )
    }

    fn require(&self, column: &'static str) -> Result<(), CsvError> {
        if self.0.contains_key(&column.to_ascii_lowercase()) {
            Ok(())
        } else {
            Err(CsvError::MissingColumn(column))
        }
    }

    fn get(&self, record: &StringRecord, column: &str) -> Option<String> {
        self.0
            .get(&column.to_ascii_lowercase())
            .and_then(|&i| record.get(i))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

fn reader(data: &[u8]) -> csv::Reader<&[u8]> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data)
}

/// Parses a student CSV into candidate rows, one per data line.
///
/// Lines whose every cell is blank are skipped. No validation happens here; that is
/// left to the reconciler so bad rows are reported rather than aborting the file.
pub fn parse_student_csv(data: &[u8]) -> Result<Vec<CandidateRecord>, CsvError> {
    let mut csv = reader(data);
    let headers = HeaderMap::new(csv.headers()?);
    headers.require("admissionNumber")?;
    headers.require("name")?;

    let mut rows = Vec::new();
    for result in csv.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(CandidateRecord {
            admission_number: headers.get(&record, "admissionNumber"),
            name: headers.get(&record, "name"),
            date_of_birth: headers.get(&record, "dateOfBirth"),
            admission_date: headers.get(&record, "admissionDate"),
            aadhar_number: headers.get(&record, "aadharNumber"),
            pen_number: headers.get(&record, "penNumber"),
            aapar_id: headers.get(&record, "aaparId"),
            mobile_number: headers.get(&record, "mobileNumber"),
            address: headers.get(&record, "address"),
            grade: headers.get(&record, "grade"),
            section: headers.get(&record, "section"),
            yearly_fee_amount: headers.get(&record, "yearlyFeeAmount"),
        });
    }
    Ok(rows)
}

/// Parses a marks sheet. Rows without an admission number are ignored.
pub fn parse_marks_csv(data: &[u8]) -> Result<Vec<MarksRow>, CsvError> {
    let mut csv = reader(data);
    let headers = HeaderMap::new(csv.headers()?);
    headers.require("admissionNumber")?;
    headers.require("marks")?;

    let mut rows = Vec::new();
    for result in csv.records() {
        let record = result?;
        let Some(admission_number) = headers.get(&record, "admissionNumber") else {
            continue;
        };
        rows.push(MarksRow {
            admission_number,
            name: headers.get(&record, "name"),
            marks: headers.get(&record, "marks"),
        });
    }
    Ok(rows)
}

//=========================================================================================
// Writing
//=========================================================================================

fn write_rows<I>(header: &[&str], rows: I) -> Result<String, CsvError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CsvError::Write(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CsvError::Write(e.to_string()))
}

fn candidate_cells(c: &CandidateRecord) -> Vec<String> {
    [
        &c.admission_number,
        &c.name,
        &c.date_of_birth,
        &c.admission_date,
        &c.aadhar_number,
        &c.pen_number,
        &c.aapar_id,
        &c.mobile_number,
        &c.address,
        &c.grade,
        &c.section,
        &c.yearly_fee_amount,
    ]
    .into_iter()
    .map(|v| v.clone().unwrap_or_default())
    .collect()
}

fn in_grade<'a>(
    students: &'a [StudentRecord],
    grade: Option<&'a str>,
) -> impl Iterator<Item = &'a StudentRecord> {
    students
        .iter()
        .filter(move |s| grade.map_or(true, |g| s.fields.grade.as_deref() == Some(g)))
}

/// Exports students, optionally only those of one grade, in the import layout.
pub fn write_students_csv(
    students: &[StudentRecord],
    grade: Option<&str>,
) -> Result<String, CsvError> {
    write_rows(
        &STUDENT_HEADERS,
        in_grade(students, grade).map(|s| candidate_cells(&CandidateRecord::from(&s.fields))),
    )
}

/// Like `write_students_csv`, but never headers-only: an empty selection yields one
/// blank row for the operator to fill in.
pub fn student_template(
    students: &[StudentRecord],
    grade: Option<&str>,
) -> Result<String, CsvError> {
    let mut rows: Vec<Vec<String>> = in_grade(students, grade)
        .map(|s| candidate_cells(&CandidateRecord::from(&s.fields)))
        .collect();
    if rows.is_empty() {
        rows.push(vec![String::new(); STUDENT_HEADERS.len()]);
    }
    write_rows(&STUDENT_HEADERS, rows)
}

/// Writes raw candidate rows back out, e.g. the rows skipped by an import.
pub fn write_candidates_csv(rows: &[CandidateRecord]) -> Result<String, CsvError> {
    write_rows(&STUDENT_HEADERS, rows.iter().map(candidate_cells))
}

/// A blank marks sheet listing the given students.
pub fn marks_template(students: &[&StudentRecord]) -> Result<String, CsvError> {
    write_rows(
        &MARKS_HEADERS,
        students.iter().map(|s| {
            vec![
                s.fields.admission_number.clone(),
                s.fields.name.clone(),
                String::new(),
            ]
        }),
    )
}
