//! Credit participant.
//!
//! Owns customer credit accounts and handles `ReserveCredit` /
//! `ReleaseCredit` commands, emitting `CreditReserved`,
//! `CreditReservationFailed`, and `CreditReleased` events. Reservations are
//! idempotent: an applied-operation ledger keyed by transaction makes
//! redelivered commands no-ops.

pub mod account;
pub mod error;
pub mod handler;
pub mod listener;
pub mod store;

pub use account::{CreditAccount, ReserveRejection};
pub use error::CreditError;
pub use handler::CreditHandler;
pub use store::{CreditStore, InMemoryCreditStore, ReleaseOutcome, ReserveOutcome};
