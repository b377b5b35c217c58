//! Saga initiation, inspection, and cancellation endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use common::{CustomerId, Money, PaymentType, TransactionId, VehicleId};
use credit::InMemoryCreditStore;
use orchestrator::{Orchestrator, SagaRecord, SagaStore};
use payment::InMemoryPaymentStore;
use serde::{Deserialize, Serialize};
use vehicle::InMemoryVehicleStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: SagaStore> {
    pub orchestrator: Arc<Orchestrator<S>>,
    pub saga_store: Arc<S>,
    pub credit_store: InMemoryCreditStore,
    pub vehicle_store: InMemoryVehicleStore,
    pub payment_store: InMemoryPaymentStore,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PurchaseRequest {
    pub customer_id: String,
    pub vehicle_id: String,
    pub payment_type: String,
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub message: String,
    pub transaction_id: String,
    pub saga_status: String,
    pub vehicle_price: Money,
    pub payment_type: String,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub message: String,
    pub transaction_id: String,
    pub current_step: String,
    pub status: String,
}

// -- Handlers --

/// POST /purchase — validate preconditions and start a saga.
#[tracing::instrument(skip(state, req))]
pub async fn start<S: SagaStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    let customer_id: CustomerId = req
        .customer_id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid customer_id: {e}")))?;
    let vehicle_id: VehicleId = req
        .vehicle_id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid vehicle_id: {e}")))?;
    let payment_type = PaymentType::from_str(&req.payment_type).map_err(ApiError::BadRequest)?;

    let saga = state
        .orchestrator
        .start_purchase(customer_id, vehicle_id, payment_type)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PurchaseResponse {
            message: "Purchase saga initiated. Credit reservation pending.".to_string(),
            transaction_id: saga.transaction_id.to_string(),
            saga_status: saga.status.to_string(),
            vehicle_price: saga.amount,
            payment_type: saga.payment_type.to_string(),
        }),
    ))
}

/// GET /saga-states/{transaction_id} — full saga record.
#[tracing::instrument(skip(state))]
pub async fn saga_state<S: SagaStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<SagaRecord>, ApiError> {
    let transaction_id = parse_transaction_id(&transaction_id)?;
    let saga = state
        .orchestrator
        .get_saga(transaction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Saga state not found".to_string()))?;
    Ok(Json(saga))
}

/// POST /purchase/{transaction_id}/cancel — request a cancellation.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: SagaStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(transaction_id): Path<String>,
    req: Option<Json<CancelRequest>>,
) -> Result<Json<CancelResponse>, ApiError> {
    let transaction_id = parse_transaction_id(&transaction_id)?;
    let reason = req
        .and_then(|Json(r)| r.reason)
        .unwrap_or_else(|| "Requested by customer".to_string());

    let saga = state
        .orchestrator
        .request_cancellation(transaction_id, &reason)
        .await?;

    Ok(Json(CancelResponse {
        message: "Cancellation accepted. Compensation in progress.".to_string(),
        transaction_id: saga.transaction_id.to_string(),
        current_step: saga.current_step.to_string(),
        status: saga.status.to_string(),
    }))
}

fn parse_transaction_id(raw: &str) -> Result<TransactionId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid transaction_id: {e}")))
}
