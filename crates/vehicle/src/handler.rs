//! Command handler for the vehicle participant.

use std::sync::Arc;

use bus::{BusMessage, MessageBus};
use chrono::Utc;
use messages::{
    Command, Event, Naming, ReleaseVehicleData, ReserveVehicleData, VehicleReleasedData,
    VehicleReservationFailedData, VehicleReservedData,
};

use crate::error::Result;
use crate::store::{ReserveVehicleOutcome, VehicleStore};

/// Handles vehicle commands against the store and publishes the outcome
/// events.
pub struct VehicleHandler<S> {
    store: S,
    bus: Arc<dyn MessageBus>,
    naming: Naming,
}

impl<S: VehicleStore> VehicleHandler<S> {
    /// Creates a new handler.
    pub fn new(store: S, bus: Arc<dyn MessageBus>, naming: Naming) -> Self {
        Self { store, bus, naming }
    }

    /// Dispatches a decoded command.
    pub async fn handle(&self, command: &Command) -> Result<()> {
        match command {
            Command::ReserveVehicle(data) => self.handle_reserve(data).await,
            Command::ReleaseVehicle(data) => self.handle_release(data).await,
            other => {
                tracing::warn!(
                    command = other.command_type(),
                    "vehicle handler received foreign command"
                );
                Ok(())
            }
        }
    }

    #[tracing::instrument(skip(self, cmd), fields(transaction_id = %cmd.transaction_id))]
    async fn handle_reserve(&self, cmd: &ReserveVehicleData) -> Result<()> {
        metrics::counter!("vehicle_commands_total", "command" => "reserve").increment(1);

        let outcome = self.store.reserve(cmd.transaction_id, cmd.vehicle_id).await?;
        let event = match outcome {
            ReserveVehicleOutcome::Reserved(vehicle) => {
                tracing::info!(vehicle_id = %cmd.vehicle_id, "vehicle reserved");
                Event::VehicleReserved(VehicleReservedData {
                    transaction_id: cmd.transaction_id,
                    vehicle_id: cmd.vehicle_id,
                    vehicle_price: vehicle.price,
                    timestamp: Utc::now(),
                })
            }
            ReserveVehicleOutcome::NotFound => {
                self.reservation_failed(cmd, "Vehicle not found")
            }
            ReserveVehicleOutcome::Unavailable => {
                self.reservation_failed(cmd, "Vehicle already reserved or sold")
            }
        };
        self.publish(event).await
    }

    fn reservation_failed(&self, cmd: &ReserveVehicleData, reason: &str) -> Event {
        tracing::warn!(vehicle_id = %cmd.vehicle_id, reason, "vehicle reservation refused");
        metrics::counter!("vehicle_reservations_failed").increment(1);
        Event::VehicleReservationFailed(VehicleReservationFailedData {
            transaction_id: cmd.transaction_id,
            vehicle_id: cmd.vehicle_id,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        })
    }

    #[tracing::instrument(skip(self, cmd), fields(transaction_id = %cmd.transaction_id))]
    async fn handle_release(&self, cmd: &ReleaseVehicleData) -> Result<()> {
        metrics::counter!("vehicle_commands_total", "command" => "release").increment(1);

        // Best-effort: a missing vehicle still acknowledges the release so
        // the orchestrator can advance.
        let released = self.store.release(cmd.transaction_id, cmd.vehicle_id).await?;
        tracing::info!(
            vehicle_id = %cmd.vehicle_id,
            found = released.is_some(),
            "vehicle released"
        );

        self.publish(Event::VehicleReleased(VehicleReleasedData {
            transaction_id: cmd.transaction_id,
            vehicle_id: cmd.vehicle_id,
            timestamp: Utc::now(),
        }))
        .await
    }

    async fn publish(&self, event: Event) -> Result<()> {
        let message = BusMessage::encode(&event, event.transaction_id())?;
        let topic = self.naming.topic(event.topic());
        self.bus.publish(&topic, message).await?;
        Ok(())
    }
}
