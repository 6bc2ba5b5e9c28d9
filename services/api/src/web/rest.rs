//! services/api/src/web/rest.rs
//!
//! Contains the master definition for the OpenAPI specification, the health
//! check, and the small response helpers shared by the REST handlers.

use axum::{
    http::header,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::web::{fees, grades, reports, students};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        students::list_students_handler,
        students::create_student_handler,
        students::update_student_handler,
        students::delete_student_handler,
        students::import_students_handler,
        students::import_students_csv_handler,
        students::skipped_rows_csv_handler,
        students::export_students_handler,
        students::student_template_handler,
        grades::list_grades_handler,
        grades::save_grades_handler,
        grades::import_marks_csv_handler,
        grades::marks_template_handler,
        fees::list_fees_handler,
        fees::record_fee_handler,
        fees::fee_balance_handler,
        reports::report_card_handler,
        reports::dashboard_handler,
    ),
    components(
        schemas(
            ErrorBody,
            HealthResponse,
            students::ImportRequest,
            students::SkippedRowsRequest,
            students::DeletedResponse,
        )
    ),
    tags(
        (name = "School Admin API", description = "Student records, bulk imports, grades, fees and reports.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Response Types
//=========================================================================================

/// The body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// A `text/csv` download named `filename`.
pub fn csv_response(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}

/// Treats `?grade=` the same as leaving the parameter out.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "The service is up", body = HealthResponse)
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
