//! services/api/src/web/grades.rs
//!
//! Grade entry, marks-sheet upload and the marks-sheet template.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Query, State},
    response::{IntoResponse, Json},
};
use school_admin_core::csv_codec::{marks_template, parse_marks_csv};
use school_admin_core::domain::{GradeEntry, GradeSaveSummary};
use school_admin_core::grades::{class_roster, resolve_marks_sheet, save_grades};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::web::rest::{csv_response, non_empty, ErrorBody};
use crate::web::state::AppState;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClassQuery {
    pub grade: Option<String>,
    pub section: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MarksImportQuery {
    /// The subject every mark on the sheet is for.
    pub subject: Option<String>,
    /// The term every mark on the sheet is for.
    pub term: Option<String>,
    /// Restricts matching to students of this grade.
    pub grade: Option<String>,
    /// Restricts matching to students of this section.
    pub section: Option<String>,
}

/// The outcome of a marks-sheet upload.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksImportResponse {
    #[serde(flatten)]
    pub saved: GradeSaveSummary,
    pub unknown_admission_numbers: Vec<String>,
    pub unreadable_admission_numbers: Vec<String>,
}

/// List all recorded grades.
#[utoipa::path(
    get,
    path = "/api/grades",
    responses(
        (status = 200, description = "All grades")
    )
)]
pub async fn list_grades_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(app_state.store.list_grades().await?))
}

/// Insert or overwrite a batch of grades keyed by student, subject and term.
#[utoipa::path(
    post,
    path = "/api/grades",
    request_body(content_type = "application/json", description = "An array of {studentId, subject, marks, term}."),
    responses(
        (status = 200, description = "Counts of inserted, updated and invalid entries"),
        (status = 400, description = "The body is not an array of grade entries", body = ErrorBody),
        (status = 500, description = "Nothing was saved", body = ErrorBody)
    )
)]
pub async fn save_grades_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<Vec<GradeEntry>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(entries) = payload?;
    let summary = save_grades(&*app_state.store, &entries).await?;
    Ok(Json(summary))
}

/// Upload a filled-in marks sheet for one subject and term.
#[utoipa::path(
    post,
    path = "/api/grades/import/csv",
    request_body(content = String, content_type = "text/csv", description = "admissionNumber,name,marks"),
    responses(
        (status = 200, description = "Counts of saved entries plus the rows that could not be matched"),
        (status = 400, description = "Unreadable CSV or missing subject/term", body = ErrorBody)
    ),
    params(MarksImportQuery)
)]
pub async fn import_marks_csv_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<MarksImportQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let subject = non_empty(&query.subject)
        .ok_or_else(|| ApiError::BadRequest("subject is required".to_string()))?;
    let term = non_empty(&query.term)
        .ok_or_else(|| ApiError::BadRequest("term is required".to_string()))?;
    let rows = parse_marks_csv(&body)?;

    let students = app_state.store.list_students().await?;
    let roster = class_roster(&students, non_empty(&query.grade), non_empty(&query.section));
    let sheet = resolve_marks_sheet(&rows, &roster, subject, term);
    info!(
        subject,
        term,
        rows = rows.len(),
        unknown = sheet.unknown_admission_numbers.len(),
        "Importing marks sheet"
    );

    let saved = save_grades(&*app_state.store, &sheet.entries).await?;
    Ok(Json(MarksImportResponse {
        saved,
        unknown_admission_numbers: sheet.unknown_admission_numbers,
        unreadable_admission_numbers: sheet.unreadable_admission_numbers,
    }))
}

/// A blank marks sheet listing the students of a class.
#[utoipa::path(
    get,
    path = "/api/grades/template",
    responses(
        (status = 200, description = "Marks sheet CSV", content_type = "text/csv", body = String)
    ),
    params(ClassQuery)
)]
pub async fn marks_template_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ClassQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let students = app_state.store.list_students().await?;
    let roster = class_roster(&students, non_empty(&query.grade), non_empty(&query.section));
    let body = marks_template(&roster)?;
    Ok(csv_response("marks-sheet.csv", body))
}
