//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orchestrator::OrchestratorError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Orchestrator error, classified below.
    Orchestrator(OrchestratorError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Orchestrator(err) => orchestrator_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn orchestrator_error_to_response(err: OrchestratorError) -> (StatusCode, String) {
    match &err {
        OrchestratorError::CustomerNotFound(_)
        | OrchestratorError::VehicleNotFound(_)
        | OrchestratorError::SagaNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        OrchestratorError::VehicleUnavailable(_)
        | OrchestratorError::InsufficientFunds { .. }
        | OrchestratorError::NotCancellable(_)
        | OrchestratorError::CancellationRejected { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        OrchestratorError::CancellationInProgress(_) => (StatusCode::CONFLICT, err.to_string()),
        OrchestratorError::InitialCommandFailed(_)
        | OrchestratorError::Store(_)
        | OrchestratorError::Gateway(_)
        | OrchestratorError::Bus(_) => {
            tracing::error!(error = %err, "orchestrator failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        ApiError::Orchestrator(err)
    }
}
