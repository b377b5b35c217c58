use thiserror::Error;

/// Errors that can occur in the credit participant.
///
/// Domain failures (unknown customer, insufficient funds) are not errors:
/// they are outcomes that become `CreditReservationFailed` events.
#[derive(Debug, Error)]
pub enum CreditError {
    /// The backing store failed.
    #[error("Credit store error: {0}")]
    Store(String),

    /// Publishing an event failed.
    #[error("Bus error: {0}")]
    Bus(#[from] bus::BusError),
}

/// Result type for credit operations.
pub type Result<T> = std::result::Result<T, CreditError>;
