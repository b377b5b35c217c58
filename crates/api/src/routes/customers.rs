//! Customer boundary endpoints consumed by the orchestrator's pre-flight
//! validation and by external clients.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use common::{CustomerId, Money};
use credit::CreditStore;
use orchestrator::SagaStore;
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::purchase::AppState;

#[derive(Serialize)]
pub struct CustomerResponse {
    pub id: String,
    pub account_balance: Money,
    pub credit_limit: Money,
    pub available_credit: Money,
    pub status: &'static str,
}

/// GET /customers/{id} — balances and available credit.
#[tracing::instrument(skip(state))]
pub async fn get<S: SagaStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let customer_id: CustomerId = id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid customer id: {e}")))?;

    let account = state
        .credit_store
        .get(customer_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("Customer {id} not found")))?;

    Ok(Json(CustomerResponse {
        id: account.customer_id.to_string(),
        account_balance: account.account_balance,
        credit_limit: account.credit_limit,
        available_credit: account.available_credit(),
        status: "active",
    }))
}
