//! services/api/src/web/students.rs
//!
//! Student CRUD plus the bulk import and CSV exchange endpoints.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use school_admin_core::csv_codec::{
    parse_student_csv, student_template, write_candidates_csv, write_students_csv,
};
use school_admin_core::domain::{ImportStrategy, ImportSummary};
use school_admin_core::ports::PortError;
use school_admin_core::reconcile::{reconcile, reconcile_rows, skipped_rows};
use school_admin_core::validation::{
    validate_candidate, validate_patch, BatchRow, CandidateRecord, InvalidRow,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::rest::{csv_response, non_empty, ErrorBody};
use crate::web::state::AppState;

//=========================================================================================
// API Payload Structs
//=========================================================================================

/// A batch of student rows to reconcile into the store.
///
/// Elements are read one by one, so an element that is not a student record is
/// rejected on its own without failing the request.
#[derive(Deserialize, ToSchema)]
pub struct ImportRequest {
    #[schema(value_type = Vec<Object>)]
    pub students: Vec<Value>,
    /// `skip` (default) or `upsert`.
    #[serde(default)]
    pub strategy: Option<String>,
}

/// The batch from a skip-strategy import and the `skippedRows` positions it reported.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRowsRequest {
    #[schema(value_type = Vec<Object>)]
    pub students: Vec<Value>,
    /// 1-based positions in `students`.
    pub skipped_rows: Vec<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct DeletedResponse {
    pub deleted: Uuid,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StrategyQuery {
    /// `skip` (default) or `upsert`.
    pub strategy: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GradeQuery {
    /// Only students of this grade.
    pub grade: Option<String>,
}

fn read_rows(values: Vec<Value>) -> Vec<BatchRow> {
    values
        .into_iter()
        .map(|value| {
            CandidateRecord::deserialize(value).map_err(|e| InvalidRow::Malformed(e.to_string()))
        })
        .collect()
}

fn parse_strategy(raw: Option<&str>) -> Result<ImportStrategy, ApiError> {
    raw.unwrap_or_default()
        .parse::<ImportStrategy>()
        .map_err(ApiError::BadRequest)
}

//=========================================================================================
// CRUD Handlers
//=========================================================================================

/// List every student, ordered by admission number.
#[utoipa::path(
    get,
    path = "/api/students",
    responses(
        (status = 200, description = "All students"),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_students_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let students = app_state.store.list_students().await?;
    Ok(Json(students))
}

/// Create one student.
#[utoipa::path(
    post,
    path = "/api/students",
    request_body(content_type = "application/json", description = "The student's fields, camelCase."),
    responses(
        (status = 201, description = "Student created"),
        (status = 400, description = "A field failed validation", body = ErrorBody),
        (status = 409, description = "The admission number is already taken", body = ErrorBody)
    )
)]
pub async fn create_student_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<CandidateRecord>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(candidate) = payload?;
    let fields = validate_candidate(&candidate)
        .into_result()
        .map_err(|e| PortError::Validation(e.to_string()))?;
    let student = app_state.store.create_student(&fields).await?;
    info!(admission_number = %student.admission_number(), "Student created");
    Ok((StatusCode::CREATED, Json(student)))
}

/// Partially update the student with the given admission number.
///
/// Fields left out are unchanged; an empty string clears an optional field.
/// The admission number itself may be corrected.
#[utoipa::path(
    put,
    path = "/api/students/{admissionNumber}",
    request_body(content_type = "application/json", description = "The fields to change, camelCase."),
    responses(
        (status = 200, description = "The updated student"),
        (status = 400, description = "A field failed validation", body = ErrorBody),
        (status = 404, description = "No such student", body = ErrorBody),
        (status = 409, description = "The new admission number is already taken", body = ErrorBody)
    ),
    params(
        ("admissionNumber" = String, Path, description = "The student's current admission number.")
    )
)]
pub async fn update_student_handler(
    State(app_state): State<Arc<AppState>>,
    Path(admission_number): Path<String>,
    payload: Result<Json<CandidateRecord>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(candidate) = payload?;
    let patch = validate_patch(&candidate).map_err(|e| PortError::Validation(e.to_string()))?;
    let student = app_state
        .store
        .update_student(&admission_number, &patch)
        .await?;
    info!(
        admission_number = %admission_number,
        now = %student.admission_number(),
        "Student updated"
    );
    Ok(Json(student))
}

/// Delete a student together with their fee and grade records.
#[utoipa::path(
    delete,
    path = "/api/students/{id}",
    responses(
        (status = 200, description = "Student deleted", body = DeletedResponse),
        (status = 404, description = "No such student", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The student's id.")
    )
)]
pub async fn delete_student_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !app_state.store.delete_student_by_id(id).await? {
        return Err(PortError::NotFound(format!("Student {} not found", id)).into());
    }
    info!(student_id = %id, "Student deleted");
    Ok(Json(DeletedResponse { deleted: id }))
}

//=========================================================================================
// Bulk Import Handlers
//=========================================================================================

/// Reconcile a JSON batch of students into the store.
///
/// Rows that fail validation are reported, never fatal. The whole batch commits
/// or none of it does.
#[utoipa::path(
    post,
    path = "/api/students/import",
    request_body = ImportRequest,
    responses(
        (status = 200, description = "Counts of added, skipped, updated and invalid rows"),
        (status = 400, description = "Unknown strategy or a body that is not JSON", body = ErrorBody),
        (status = 500, description = "The batch was rolled back", body = ErrorBody)
    )
)]
pub async fn import_students_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let strategy = parse_strategy(request.strategy.as_deref())?;
    let batch = read_rows(request.students);
    let summary = reconcile_rows(&*app_state.store, &batch, strategy).await?;
    Ok(Json(summary))
}

/// Reconcile an uploaded student CSV into the store.
#[utoipa::path(
    post,
    path = "/api/students/import/csv",
    request_body(content = String, content_type = "text/csv", description = "A student CSV with a header row."),
    responses(
        (status = 200, description = "Counts of added, skipped, updated and invalid rows"),
        (status = 400, description = "Unreadable CSV or unknown strategy", body = ErrorBody)
    ),
    params(StrategyQuery)
)]
pub async fn import_students_csv_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<StrategyQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let strategy = parse_strategy(query.strategy.as_deref())?;
    let batch = parse_student_csv(&body)?;
    info!(rows = batch.len(), %strategy, "Importing student CSV");
    let summary = reconcile(&*app_state.store, &batch, strategy).await?;
    Ok(Json(summary))
}

/// The rows a skip-strategy import left alone, as CSV, so they can be reviewed
/// and re-submitted with `upsert`.
#[utoipa::path(
    post,
    path = "/api/students/import/skipped",
    request_body = SkippedRowsRequest,
    responses(
        (status = 200, description = "The skipped rows", content_type = "text/csv", body = String),
        (status = 400, description = "The body is not JSON", body = ErrorBody)
    )
)]
pub async fn skipped_rows_csv_handler(
    payload: Result<Json<SkippedRowsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let summary = ImportSummary {
        skipped: request.skipped_rows.len(),
        skipped_rows: request.skipped_rows,
        ..Default::default()
    };
    let rows: Vec<CandidateRecord> = read_rows(skipped_rows(&request.students, &summary))
        .into_iter()
        .filter_map(Result::ok)
        .collect();
    let body = write_candidates_csv(&rows)?;
    Ok(csv_response("skipped-students.csv", body))
}

//=========================================================================================
// CSV Download Handlers
//=========================================================================================

/// Export students as CSV in the import layout.
#[utoipa::path(
    get,
    path = "/api/students/export",
    responses(
        (status = 200, description = "Student CSV", content_type = "text/csv", body = String)
    ),
    params(GradeQuery)
)]
pub async fn export_students_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<GradeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let students = app_state.store.list_students().await?;
    let body = write_students_csv(&students, non_empty(&query.grade))?;
    Ok(csv_response("students.csv", body))
}

/// A fill-in template: the current students of the grade, or one blank row.
#[utoipa::path(
    get,
    path = "/api/students/template",
    responses(
        (status = 200, description = "Student CSV template", content_type = "text/csv", body = String)
    ),
    params(GradeQuery)
)]
pub async fn student_template_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<GradeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let students = app_state.store.list_students().await?;
    let body = student_template(&students, non_empty(&query.grade))?;
    Ok(csv_response("students-template.csv", body))
}
