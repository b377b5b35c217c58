//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use orchestrator::SagaStore;
use serde::Serialize;

use crate::routes::purchase::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// GET /health — 200 while the saga store is reachable, 503 otherwise.
pub async fn check<S: SagaStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    match state.saga_store.ping().await {
        Ok(()) => Ok(Json(HealthResponse {
            status: "healthy",
            service: "orchestrator",
            timestamp: Utc::now(),
        })),
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    service: "orchestrator",
                    timestamp: Utc::now(),
                }),
            ))
        }
    }
}
