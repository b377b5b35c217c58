//! Payment boundary lookup endpoints for codes and payment records.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use common::TransactionId;
use orchestrator::SagaStore;
use payment::{PaymentCode, PaymentRecord, PaymentStore};
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::purchase::AppState;

#[derive(Serialize)]
pub struct PaymentCodeResponse {
    pub code: String,
    pub transaction_id: String,
    pub amount: common::Money,
    pub status: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<PaymentCode> for PaymentCodeResponse {
    fn from(code: PaymentCode) -> Self {
        Self {
            transaction_id: code.transaction_id.to_string(),
            amount: code.amount,
            status: code.status.to_string(),
            expires_at: code.expires_at,
            code: code.code,
        }
    }
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub payment_id: String,
    pub transaction_id: String,
    pub payment_code: String,
    pub amount: common::Money,
    pub payment_method: String,
    pub status: String,
    pub processed_at: chrono::DateTime<chrono::Utc>,
}

impl From<PaymentRecord> for PaymentResponse {
    fn from(record: PaymentRecord) -> Self {
        Self {
            payment_id: record.payment_id,
            transaction_id: record.transaction_id.to_string(),
            payment_code: record.payment_code,
            amount: record.amount,
            payment_method: record.payment_method,
            status: record.status.to_string(),
            processed_at: record.processed_at,
        }
    }
}

/// GET /payment-codes/{code}.
#[tracing::instrument(skip(state))]
pub async fn get_code<S: SagaStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(code): Path<String>,
) -> Result<Json<PaymentCodeResponse>, ApiError> {
    let record = state
        .payment_store
        .get_code(&code)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Payment code not found".to_string()))?;
    Ok(Json(record.into()))
}

/// GET /payments/{transaction_id}.
#[tracing::instrument(skip(state))]
pub async fn get_payment<S: SagaStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let transaction_id: TransactionId = transaction_id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid transaction_id: {e}")))?;
    let record = state
        .payment_store
        .get_payment_for_transaction(transaction_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;
    Ok(Json(record.into()))
}
