//! Bus wiring for the credit participant.

use std::sync::Arc;

use bus::{MessageBus, Subscription};
use messages::{topics, Command, Naming};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::handler::CreditHandler;
use crate::store::CreditStore;

/// Subscription-name prefix for this participant.
pub const SERVICE_NAME: &str = "credit";

const COMMAND_TOPICS: &[&str] = &[topics::CMD_CREDIT_RESERVE, topics::CMD_CREDIT_RELEASE];

const EVENT_TOPICS: &[&str] = &[
    topics::EVT_CREDIT_RESERVED,
    topics::EVT_CREDIT_RESERVATION_FAILED,
    topics::EVT_CREDIT_RELEASED,
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
pub async fn start<S: CreditStore + 'static>(
    handler: Arc<CreditHandler<S>>,
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

/// Consumes one subscription until the bus shuts down.
///
/// Every delivery is acked: domain failures become events, infrastructure
/// failures are logged and retried on the next purchase attempt, and
/// undecodable payloads are discarded so they cannot loop forever.
pub async fn run<S: CreditStore>(
    handler: Arc<CreditHandler<S>>,
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
                        "credit command handling failed"
                    );
                }
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    payload = %delivery.message().data_lossy(),
                    "discarding undecodable credit command"
                );
            }
        }
        delivery.ack();
    }
}
