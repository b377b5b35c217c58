//! Orchestrator error types.

use common::{CustomerId, Money, TransactionId, VehicleId};
use thiserror::Error;

use crate::gateways::GatewayError;
use crate::status::SagaStatus;
use crate::step::SagaStep;
use crate::store::StoreError;

/// Errors surfaced by the orchestrator. The HTTP layer maps these onto the
/// response codes of the purchase API.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The referenced customer does not exist (404).
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// The referenced vehicle does not exist (404).
    #[error("Vehicle not found: {0}")]
    VehicleNotFound(VehicleId),

    /// The vehicle is reserved or sold (400).
    #[error("Vehicle {0} is not available for purchase")]
    VehicleUnavailable(VehicleId),

    /// The customer cannot fund the purchase (400).
    #[error("Insufficient funds: price is {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    /// No saga exists for the transaction (404).
    #[error("Saga state not found: {0}")]
    SagaNotFound(TransactionId),

    /// A cancellation is already being driven (409).
    #[error("Cancellation already in progress for transaction {0}")]
    CancellationInProgress(TransactionId),

    /// The saga is in a status a cancellation cannot touch (400).
    #[error("Cannot cancel transaction with status: {0}")]
    NotCancellable(SagaStatus),

    /// The cancellation was refused because the purchase is too far along;
    /// the refusal has been recorded on the saga (400).
    #[error("{reason}")]
    CancellationRejected {
        reason: String,
        current_step: SagaStep,
    },

    /// The initial ReserveCredit command could not be enqueued (500).
    #[error("Failed to publish initial command: {0}")]
    InitialCommandFailed(String),

    /// Saga store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Peer service call failure.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Bus failure.
    #[error("Bus error: {0}")]
    Bus(#[from] bus::BusError),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
