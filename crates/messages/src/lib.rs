//! Message schema for the vehicle-purchase saga.
//!
//! Commands instruct a participant to perform a local transaction; events
//! announce the outcome. Both are JSON tagged unions published on named
//! topics (`commands.<domain>.<verb>`, `events.<domain>.<past-tense>`), and
//! every message carries the saga's `transaction_id`.

pub mod commands;
pub mod events;
pub mod topics;

pub use commands::{
    Command, GeneratePaymentCodeData, ProcessPaymentData, RefundPaymentData, ReleaseCreditData,
    ReleaseVehicleData, ReserveCreditData, ReserveVehicleData,
};
pub use events::{
    CreditReleasedData, CreditReservationFailedData, CreditReservedData, Event,
    PaymentCodeGeneratedData, PaymentCodeGenerationFailedData, PaymentFailedData,
    PaymentProcessedData, PaymentRefundFailedData, PaymentRefundedData,
    PurchaseCancellationFailedData, PurchaseCancelledData, VehicleReleasedData,
    VehicleReservationFailedData, VehicleReservedData,
};
pub use topics::Naming;
