//! Vehicle participant.
//!
//! Owns the vehicle inventory and handles `ReserveVehicle` /
//! `ReleaseVehicle` commands, emitting `VehicleReserved`,
//! `VehicleReservationFailed`, and `VehicleReleased`. Marking a vehicle sold
//! is a synchronous call exposed at the HTTP boundary for the orchestrator's
//! final step.

pub mod error;
pub mod handler;
pub mod listener;
pub mod store;
pub mod vehicle;

pub use error::VehicleError;
pub use handler::VehicleHandler;
pub use store::{InMemoryVehicleStore, ReserveVehicleOutcome, VehicleStore};
pub use vehicle::Vehicle;
