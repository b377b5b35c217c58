//! Outbox publisher.
//!
//! Drains outbox rows committed by [`SagaStore::save_with_outbox`] to the
//! bus. Publishing is at-least-once: a message is only marked published
//! after the bus accepted it, so a crash in between re-publishes on the
//! next pass (participants and the orchestrator are idempotent against
//! duplicates).

use std::sync::Arc;
use std::time::Duration;

use bus::{BusMessage, MessageBus};
use messages::Naming;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::store::SagaStore;

/// Default pause between drain passes when the outbox is empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

const BATCH_SIZE: usize = 32;

/// Moves committed outbox messages onto the bus.
pub struct OutboxPublisher<S> {
    store: Arc<S>,
    bus: Arc<dyn MessageBus>,
    naming: Naming,
}

impl<S: SagaStore + 'static> OutboxPublisher<S> {
    /// Creates a new publisher.
    pub fn new(store: Arc<S>, bus: Arc<dyn MessageBus>, naming: Naming) -> Self {
        Self { store, bus, naming }
    }

    /// Publishes one batch of unpublished messages. Returns how many were
    /// published; messages the bus refused stay queued for the next pass.
    pub async fn drain_once(&self) -> Result<usize> {
        let pending = self.store.fetch_unpublished(BATCH_SIZE).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut published = Vec::with_capacity(pending.len());
        for message in pending {
            let bus_message = BusMessage {
                data: serde_json::to_vec(&message.payload)
                    .map_err(crate::store::StoreError::from)?,
                attributes: [(
                    bus::ATTR_TRANSACTION_ID.to_string(),
                    message.transaction_id.to_string(),
                )]
                .into(),
            };
            let topic = self.naming.topic(&message.topic);
            match self.bus.publish(&topic, bus_message).await {
                Ok(()) => published.push(message.id),
                Err(err) => {
                    tracing::error!(
                        topic = %message.topic,
                        transaction_id = %message.transaction_id,
                        error = %err,
                        "outbox publish failed, will retry"
                    );
                    break;
                }
            }
        }

        let count = published.len();
        if count > 0 {
            self.store.mark_published(&published).await?;
            metrics::counter!("outbox_messages_published_total").increment(count as u64);
        }
        Ok(count)
    }

    /// Spawns the drain loop; runs until the returned handle is aborted.
    pub fn start(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.drain_once().await {
                    Ok(0) => tokio::time::sleep(interval).await,
                    Ok(_) => {}
                    Err(err) => {
                        tracing::error!(error = %err, "outbox drain failed");
                        tokio::time::sleep(interval).await;
                    }
                }
            }
        })
    }
}
