//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! turned into an HTTP response.

use crate::config::ConfigError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use school_admin_core::csv_codec::CsvError;
use school_admin_core::ports::PortError;
use serde_json::json;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// An uploaded CSV file that could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// A JSON body that was missing, not JSON, or the wrong shape.
    #[error("Invalid JSON body: {0}")]
    JsonRejection(#[from] JsonRejection),

    /// The request itself was malformed (bad query value, unknown strategy, ...).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Port(PortError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Port(PortError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            ApiError::Port(PortError::Conflict(msg)) => (StatusCode::CONFLICT, msg),
            ApiError::Csv(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::JsonRejection(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            other => {
                tracing::error!("Request failed: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
