//! Payment participant.
//!
//! Owns payment codes and payment records. Handles `GeneratePaymentCode`,
//! `ProcessPayment`, and `RefundPayment` commands idempotently: a
//! transaction's existing code or payment record short-circuits a
//! redelivered command into a re-emit of the original outcome. Codes expire
//! 30 minutes after minting; a background sweeper marks decayed codes.

pub mod code;
pub mod error;
pub mod handler;
pub mod listener;
pub mod record;
pub mod store;
pub mod sweeper;

pub use code::{PaymentCode, PaymentCodeStatus, CODE_TTL};
pub use error::PaymentError;
pub use handler::PaymentHandler;
pub use record::{PaymentRecord, PaymentStatus};
pub use store::{InMemoryPaymentStore, InsertCodeOutcome, PaymentStore, RefundOutcome};
