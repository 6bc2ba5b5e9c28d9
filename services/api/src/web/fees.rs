//! services/api/src/web/fees.rs
//!
//! Fee payments, payslips and per-student balances.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use school_admin_core::domain::NewFeePayment;
use school_admin_core::fees::{balance_for, record_payment};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::rest::ErrorBody;
use crate::web::state::AppState;

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct FeesQuery {
    /// Only payments made for this student.
    pub student_id: Option<Uuid>,
}

/// List fee payments by date.
#[utoipa::path(
    get,
    path = "/api/fees",
    responses(
        (status = 200, description = "Fee transactions")
    ),
    params(FeesQuery)
)]
pub async fn list_fees_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<FeesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let transactions = app_state
        .store
        .list_fee_transactions(query.student_id)
        .await?;
    Ok(Json(transactions))
}

/// Record a payment and return its payslip.
#[utoipa::path(
    post,
    path = "/api/fees",
    request_body(content_type = "application/json", description = "{studentId, amount, date, paymentMode?, remarks?}"),
    responses(
        (status = 201, description = "The payslip for the recorded payment"),
        (status = 400, description = "Unreadable body, or an amount that is not positive or not storable", body = ErrorBody),
        (status = 404, description = "No such student", body = ErrorBody)
    )
)]
pub async fn record_fee_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<NewFeePayment>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payment) = payload?;
    let payslip = record_payment(&*app_state.store, payment).await?;
    Ok((StatusCode::CREATED, Json(payslip)))
}

/// The yearly fee, the total paid so far, and what remains.
#[utoipa::path(
    get,
    path = "/api/students/{id}/balance",
    responses(
        (status = 200, description = "The student's fee balance; negative when overpaid"),
        (status = 404, description = "No such student", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The student's id.")
    )
)]
pub async fn fee_balance_handler(
    State(app_state): State<Arc<AppState>>,
    Path(student_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(balance_for(&*app_state.store, student_id).await?))
}
