use thiserror::Error;

/// Errors that can occur in the payment participant.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The backing store failed.
    #[error("Payment store error: {0}")]
    Store(String),

    /// Publishing an event failed.
    #[error("Bus error: {0}")]
    Bus(#[from] bus::BusError),
}

/// Result type for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;
