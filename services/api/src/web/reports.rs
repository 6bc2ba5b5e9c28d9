//! services/api/src/web/reports.rs
//!
//! Report cards and the dashboard summary.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use school_admin_core::ports::PortError;
use school_admin_core::reports::{dashboard_stats, report_card};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::rest::{non_empty, ErrorBody};
use crate::web::state::AppState;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TermQuery {
    /// e.g. `Term 1`.
    pub term: Option<String>,
}

/// A student's report card for one term.
#[utoipa::path(
    get,
    path = "/api/reports/{studentId}",
    responses(
        (status = 200, description = "Marks per subject with total and average"),
        (status = 400, description = "term is missing", body = ErrorBody),
        (status = 404, description = "No such student", body = ErrorBody)
    ),
    params(
        ("studentId" = Uuid, Path, description = "The student's id."),
        TermQuery
    )
)]
pub async fn report_card_handler(
    State(app_state): State<Arc<AppState>>,
    Path(student_id): Path<Uuid>,
    Query(query): Query<TermQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let term = non_empty(&query.term)
        .ok_or_else(|| ApiError::BadRequest("term is required".to_string()))?;
    let student = app_state
        .store
        .find_student_by_id(student_id)
        .await?
        .ok_or_else(|| PortError::NotFound(format!("Student {} not found", student_id)))?;
    let grades = app_state.store.list_grades().await?;
    Ok(Json(report_card(&student, &grades, term)))
}

/// Headline figures for the dashboard.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Student count, outstanding fees and grade coverage")
    )
)]
pub async fn dashboard_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let students = app_state.store.list_students().await?;
    let grades = app_state.store.list_grades().await?;
    let transactions = app_state.store.list_fee_transactions(None).await?;
    Ok(Json(dashboard_stats(&students, &grades, &transactions)))
}
