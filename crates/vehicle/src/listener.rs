//! Bus wiring for the vehicle participant.

use std::sync::Arc;

use bus::{MessageBus, Subscription};
use messages::{topics, Command, Naming};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::handler::VehicleHandler;
use crate::store::VehicleStore;

/// Subscription-name prefix for this participant.
pub const SERVICE_NAME: &str = "vehicle";

const COMMAND_TOPICS: &[&str] = &[topics::CMD_VEHICLE_RESERVE, topics::CMD_VEHICLE_RELEASE];

const EVENT_TOPICS: &[&str] = &[
    topics::EVT_VEHICLE_RESERVED,
    topics::EVT_VEHICLE_RESERVATION_FAILED,
    topics::EVT_VEHICLE_RELEASED,
];

/// Idempotently creates every topic this participant publishes to and every
/// subscription it consumes from.
pub async fn ensure_wiring(bus: &dyn MessageBus, naming: &Naming) -> Result<()> {
    for topic in EVENT_TOPICS {
        bus.ensure_topic(&naming.topic(topic)).await?;
    }
    for topic in COMMAND_TOPICS {
        let full = naming.topic(topic);
        bus.ensure_topic(&full).await?;
        bus.ensure_subscription(&naming.subscription(SERVICE_NAME, topic), &full)
            .await?;
    }
    Ok(())
}

/// Subscribes to both command topics and spawns a handler loop per
/// subscription. [`ensure_wiring`] must have run first.
pub async fn start<S: VehicleStore + 'static>(
    handler: Arc<VehicleHandler<S>>,
    bus: Arc<dyn MessageBus>,
    naming: &Naming,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();
    for topic in COMMAND_TOPICS {
        let subscription = bus
            .subscribe(&naming.subscription(SERVICE_NAME, topic))
            .await?;
        let handler = handler.clone();
        handles.push(tokio::spawn(run(handler, subscription)));
    }
    Ok(handles)
}

/// Consumes one subscription until the bus shuts down, acking every delivery.
pub async fn run<S: VehicleStore>(
    handler: Arc<VehicleHandler<S>>,
    mut subscription: Box<dyn Subscription>,
) {
    while let Some(delivery) = subscription.recv().await {
        match delivery.message().decode::<Command>() {
            Ok(command) => {
                if let Err(err) = handler.handle(&command).await {
                    tracing::error!(
                        command = command.command_type(),
                        transaction_id = %command.transaction_id(),
                        error = %err,
                        "vehicle command handling failed"
                    );
                }
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    payload = %delivery.message().data_lossy(),
                    "discarding undecodable vehicle command"
                );
            }
        }
        delivery.ack();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryVehicleStore;
    use crate::vehicle::Vehicle;
    use bus::{BusMessage, InMemoryBus};
    use common::{Money, TransactionId, VehicleId};
    use messages::{Event, ReserveVehicleData};

    #[tokio::test]
    async fn end_to_end_reserve_over_the_bus() {
        let bus = InMemoryBus::new();
        let naming = Naming::new("test-project");
        ensure_wiring(&bus, &naming).await.unwrap();

        let observed = naming.subscription("observer", topics::EVT_VEHICLE_RESERVED);
        bus.ensure_subscription(&observed, &naming.topic(topics::EVT_VEHICLE_RESERVED))
            .await
            .unwrap();

        let store = InMemoryVehicleStore::new();
        let vehicle_id = VehicleId::new();
        store
            .insert(Vehicle::new(
                vehicle_id,
                "Onix 1.0",
                "ABC-1234",
                Money::from_cents(4_500_000),
            ))
            .await
            .unwrap();

        let shared_bus: Arc<dyn MessageBus> = Arc::new(bus.clone());
        let handler = Arc::new(VehicleHandler::new(
            store,
            shared_bus.clone(),
            naming.clone(),
        ));
        let handles = start(handler, shared_bus, &naming).await.unwrap();

        let txn = TransactionId::new();
        let command = Command::ReserveVehicle(ReserveVehicleData {
            transaction_id: txn,
            vehicle_id,
        });
        bus.publish(
            &naming.topic(topics::CMD_VEHICLE_RESERVE),
            BusMessage::encode(&command, txn).unwrap(),
        )
        .await
        .unwrap();

        let mut sub = bus.subscribe(&observed).await.unwrap();
        let delivery = sub.recv().await.unwrap();
        let event: Event = delivery.message().decode().unwrap();
        delivery.ack();
        assert_eq!(event.event_type(), "VehicleReserved");

        bus.close();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
