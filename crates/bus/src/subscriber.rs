use async_trait::async_trait;

use crate::message::BusMessage;

/// A consumer handle on a subscription.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next delivery. Returns `None` when the bus has shut
    /// down and the queue is drained.
    async fn recv(&mut self) -> Option<Delivery>;
}

/// Backend hook a delivery settles through.
///
/// `ack` permanently removes the message from the subscription; `nack`
/// requests redelivery. Dropping a [`Delivery`] without settling counts as a
/// nack, so a handler that panics or errors out gets the message back.
pub trait Settle: Send {
    fn ack(self: Box<Self>);
    fn nack(self: Box<Self>);
}

/// A single delivery of a message to a subscription.
pub struct Delivery {
    message: BusMessage,
    attempt: u32,
    settle: Option<Box<dyn Settle>>,
}

impl Delivery {
    /// Creates a delivery handle. Backends call this; consumers only receive.
    pub fn new(message: BusMessage, attempt: u32, settle: Box<dyn Settle>) -> Self {
        Self {
            message,
            attempt,
            settle: Some(settle),
        }
    }

    /// The delivered message.
    pub fn message(&self) -> &BusMessage {
        &self.message
    }

    /// How many times this message has been delivered, counting this one.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Acknowledges the message. Call only after the handler's state change
    /// has committed.
    pub fn ack(mut self) {
        if let Some(settle) = self.settle.take() {
            settle.ack();
        }
    }

    /// Rejects the message, requesting redelivery.
    pub fn nack(mut self) {
        if let Some(settle) = self.settle.take() {
            settle.nack();
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(settle) = self.settle.take() {
            settle.nack();
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("attempt", &self.attempt)
            .field("transaction_id", &self.message.transaction_id())
            .finish()
    }
}
