//! Shared types used across the vehicle-purchase saga services.

mod ids;
mod money;
mod payment_type;

pub use ids::{CustomerId, TransactionId, VehicleId};
pub use money::Money;
pub use payment_type::PaymentType;
