//! Publish-subscribe bus adapter.
//!
//! Topics are named channels; subscriptions are durable, per-consumer queues
//! attached to a topic. Delivery is at-least-once: a message stays owned by a
//! subscription until the consumer acks it, and un-acked or nacked messages
//! are redelivered. After `max_deliveries` attempts a message is dead-lettered
//! so a poison message cannot loop forever.

mod error;
mod memory;
mod message;
mod subscriber;

pub use error::{BusError, Result};
pub use memory::InMemoryBus;
pub use message::{ATTR_TRANSACTION_ID, BusMessage};
pub use subscriber::{Delivery, Settle, Subscription};

use async_trait::async_trait;

/// Process-wide bus handle, injected into publishers and subscribers at
/// startup.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Creates the topic if it does not exist. Idempotent.
    async fn ensure_topic(&self, topic: &str) -> Result<()>;

    /// Creates the subscription on the topic if it does not exist. Idempotent.
    async fn ensure_subscription(&self, subscription: &str, topic: &str) -> Result<()>;

    /// Publishes a message to every subscription attached to the topic.
    async fn publish(&self, topic: &str, message: BusMessage) -> Result<()>;

    /// Opens a consumer handle on the subscription.
    async fn subscribe(&self, subscription: &str) -> Result<Box<dyn Subscription>>;
}
