use common::VehicleId;
use thiserror::Error;

/// Errors that can occur in the vehicle participant.
#[derive(Debug, Error)]
pub enum VehicleError {
    /// The vehicle does not exist.
    #[error("Vehicle not found: {0}")]
    NotFound(VehicleId),

    /// The vehicle is reserved or sold and cannot be edited.
    #[error("Vehicle {0} is reserved or sold and cannot be modified")]
    NotEditable(VehicleId),

    /// The backing store failed.
    #[error("Vehicle store error: {0}")]
    Store(String),

    /// Publishing an event failed.
    #[error("Bus error: {0}")]
    Bus(#[from] bus::BusError),
}

/// Result type for vehicle operations.
pub type Result<T> = std::result::Result<T, VehicleError>;
