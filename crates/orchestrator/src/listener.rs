//! Bus wiring for the orchestrator.
//!
//! The orchestrator subscribes to every participant event topic and owns
//! the command and purchase-outcome topics it publishes to (through the
//! outbox).

use std::sync::Arc;

use bus::{MessageBus, Subscription};
use messages::{topics, Event, Naming};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::store::SagaStore;

/// Subscription-name prefix for the orchestrator.
pub const SERVICE_NAME: &str = "orchestrator";

/// Idempotently creates every topic the orchestrator publishes to and every
/// event subscription it consumes from.
pub async fn ensure_wiring(bus: &dyn MessageBus, naming: &Naming) -> Result<()> {
    for topic in topics::COMMAND_TOPICS {
        bus.ensure_topic(&naming.topic(topic)).await?;
    }
    for topic in [
        topics::EVT_PURCHASE_CANCELLED,
        topics::EVT_PURCHASE_CANCELLATION_FAILED,
    ] {
        bus.ensure_topic(&naming.topic(topic)).await?;
    }
    for topic in topics::EVENT_TOPICS {
        let full = naming.topic(topic);
        bus.ensure_topic(&full).await?;
        bus.ensure_subscription(&naming.subscription(SERVICE_NAME, topic), &full)
            .await?;
    }
    Ok(())
}

/// Subscribes to every participant event topic and spawns a handler loop
/// per subscription. [`ensure_wiring`] must have run first.
pub async fn start<S: SagaStore + 'static>(
    orchestrator: Arc<Orchestrator<S>>,
    bus: Arc<dyn MessageBus>,
    naming: &Naming,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();
    for topic in topics::EVENT_TOPICS {
        let subscription = bus
            .subscribe(&naming.subscription(SERVICE_NAME, topic))
            .await?;
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(run(orchestrator, subscription)));
    }
    Ok(handles)
}

/// Consumes one event subscription until the bus shuts down.
///
/// Every delivery is acked: events that do not apply are ignored by the
/// state machine, handler errors are logged and retried by the next saga
/// touch, and undecodable payloads are discarded with their raw bytes
/// logged.
pub async fn run<S: SagaStore>(
    orchestrator: Arc<Orchestrator<S>>,
    mut subscription: Box<dyn Subscription>,
) {
    while let Some(delivery) = subscription.recv().await {
        match delivery.message().decode::<Event>() {
            Ok(event) => {
                if let Err(err) = orchestrator.handle_event(&event).await {
                    tracing::error!(
                        event = event.event_type(),
                        transaction_id = %event.transaction_id(),
                        error = %err,
                        "event handling failed"
                    );
                }
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    payload = %delivery.message().data_lossy(),
                    "discarding undecodable event"
                );
            }
        }
        delivery.ack();
    }
}
