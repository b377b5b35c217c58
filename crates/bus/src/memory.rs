use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{BusError, Result};
use crate::message::BusMessage;
use crate::subscriber::{Delivery, Settle, Subscription};
use crate::MessageBus;

const DEFAULT_MAX_DELIVERIES: u32 = 5;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<(BusMessage, u32)>,
    dead: Vec<BusMessage>,
    closed: bool,
}

struct SubQueue {
    name: String,
    topic: String,
    state: Mutex<QueueState>,
    notify: Notify,
    max_deliveries: u32,
}

impl SubQueue {
    fn push(&self, message: BusMessage) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.pending.push_back((message, 0));
        drop(state);
        self.notify.notify_one();
    }

    fn requeue(&self, message: BusMessage, attempts: u32) {
        let mut state = self.state.lock().unwrap();
        if attempts >= self.max_deliveries {
            tracing::warn!(
                subscription = %self.name,
                transaction_id = ?message.transaction_id(),
                attempts,
                "message exhausted deliveries, dead-lettering"
            );
            metrics::counter!("bus_dead_letters_total").increment(1);
            state.dead.push(message);
            return;
        }
        state.pending.push_back((message, attempts));
        drop(state);
        self.notify.notify_one();
    }

    fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }
}

#[derive(Default)]
struct BusState {
    topics: HashMap<String, Vec<Arc<SubQueue>>>,
    subscriptions: HashMap<String, Arc<SubQueue>>,
}

/// In-memory bus with the same contract as the production adapter:
/// per-subscription durable queues, at-least-once delivery with explicit
/// acks, redelivery of nacked messages, and dead-lettering after
/// `max_deliveries` attempts.
#[derive(Clone)]
pub struct InMemoryBus {
    state: Arc<Mutex<BusState>>,
    max_deliveries: u32,
}

impl InMemoryBus {
    /// Creates a new empty bus.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            max_deliveries: DEFAULT_MAX_DELIVERIES,
        }
    }

    /// Creates a bus that dead-letters after the given number of deliveries.
    pub fn with_max_deliveries(max_deliveries: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            max_deliveries,
        }
    }

    /// Closes every subscription; blocked consumers wake up and drain.
    pub fn close(&self) {
        let state = self.state.lock().unwrap();
        for queue in state.subscriptions.values() {
            queue.close();
        }
    }

    /// Number of messages waiting on a subscription (tests/inspection).
    pub fn pending_count(&self, subscription: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .subscriptions
            .get(subscription)
            .map(|q| q.state.lock().unwrap().pending.len())
            .unwrap_or(0)
    }

    /// Number of dead-lettered messages on a subscription (tests/inspection).
    pub fn dead_letter_count(&self, subscription: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .subscriptions
            .get(subscription)
            .map(|q| q.state.lock().unwrap().dead.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn ensure_topic(&self, topic: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.topics.entry(topic.to_string()).or_default();
        Ok(())
    }

    async fn ensure_subscription(&self, subscription: &str, topic: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.topics.contains_key(topic) {
            return Err(BusError::TopicNotFound(topic.to_string()));
        }
        if let Some(existing) = state.subscriptions.get(subscription) {
            if existing.topic != topic {
                return Err(BusError::SubscriptionConflict {
                    subscription: subscription.to_string(),
                    existing: existing.topic.clone(),
                });
            }
            return Ok(());
        }
        let queue = Arc::new(SubQueue {
            name: subscription.to_string(),
            topic: topic.to_string(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            max_deliveries: self.max_deliveries,
        });
        state
            .subscriptions
            .insert(subscription.to_string(), queue.clone());
        if let Some(attached) = state.topics.get_mut(topic) {
            attached.push(queue);
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, message: BusMessage) -> Result<()> {
        let queues = {
            let state = self.state.lock().unwrap();
            state
                .topics
                .get(topic)
                .ok_or_else(|| BusError::TopicNotFound(topic.to_string()))?
                .clone()
        };
        tracing::debug!(
            topic,
            subscribers = queues.len(),
            transaction_id = ?message.transaction_id(),
            "publishing message"
        );
        metrics::counter!("bus_messages_published_total").increment(1);
        for queue in queues {
            queue.push(message.clone());
        }
        Ok(())
    }

    async fn subscribe(&self, subscription: &str) -> Result<Box<dyn Subscription>> {
        let queue = {
            let state = self.state.lock().unwrap();
            state
                .subscriptions
                .get(subscription)
                .cloned()
                .ok_or_else(|| BusError::SubscriptionNotFound(subscription.to_string()))?
        };
        Ok(Box::new(InMemorySubscription { queue }))
    }
}

struct InMemorySubscription {
    queue: Arc<SubQueue>,
}

impl InMemorySubscription {
    fn try_pop(&self) -> Option<Delivery> {
        let mut state = self.queue.state.lock().unwrap();
        let (message, prior_attempts) = state.pending.pop_front()?;
        let attempt = prior_attempts + 1;
        let settle = InMemorySettle {
            queue: self.queue.clone(),
            message: message.clone(),
            attempt,
        };
        Some(Delivery::new(message, attempt, Box::new(settle)))
    }

    fn is_closed(&self) -> bool {
        self.queue.state.lock().unwrap().closed
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn recv(&mut self) -> Option<Delivery> {
        loop {
            // Register for notification before checking the queue so a push
            // racing with the check still wakes us.
            let notified = self.queue.notify.notified();
            if let Some(delivery) = self.try_pop() {
                return Some(delivery);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }
}

struct InMemorySettle {
    queue: Arc<SubQueue>,
    message: BusMessage,
    attempt: u32,
}

impl Settle for InMemorySettle {
    fn ack(self: Box<Self>) {}

    fn nack(self: Box<Self>) {
        self.queue.requeue(self.message, self.attempt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::TransactionId;
    use std::collections::HashMap;

    fn message(tag: &str) -> BusMessage {
        BusMessage {
            data: tag.as_bytes().to_vec(),
            attributes: HashMap::new(),
        }
    }

    async fn bus_with_sub(bus: &InMemoryBus, topic: &str, sub: &str) {
        bus.ensure_topic(topic).await.unwrap();
        bus.ensure_subscription(sub, topic).await.unwrap();
    }

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = InMemoryBus::new();
        bus_with_sub(&bus, "events.test", "svc-test-sub").await;

        bus.publish("events.test", message("m1")).await.unwrap();

        let mut sub = bus.subscribe("svc-test-sub").await.unwrap();
        let delivery = sub.recv().await.unwrap();
        assert_eq!(delivery.message().data, b"m1");
        assert_eq!(delivery.attempt(), 1);
        delivery.ack();
        assert_eq!(bus.pending_count("svc-test-sub"), 0);
    }

    #[tokio::test]
    async fn publish_to_unknown_topic_fails() {
        let bus = InMemoryBus::new();
        let result = bus.publish("events.nowhere", message("m1")).await;
        assert!(matches!(result, Err(BusError::TopicNotFound(_))));
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let bus = InMemoryBus::new();
        bus_with_sub(&bus, "events.test", "svc-test-sub").await;
        bus_with_sub(&bus, "events.test", "svc-test-sub").await;

        bus.publish("events.test", message("m1")).await.unwrap();
        // A single queue despite the double ensure.
        assert_eq!(bus.pending_count("svc-test-sub"), 1);
    }

    #[tokio::test]
    async fn subscription_on_wrong_topic_conflicts() {
        let bus = InMemoryBus::new();
        bus.ensure_topic("events.a").await.unwrap();
        bus.ensure_topic("events.b").await.unwrap();
        bus.ensure_subscription("svc-sub", "events.a").await.unwrap();

        let result = bus.ensure_subscription("svc-sub", "events.b").await;
        assert!(matches!(result, Err(BusError::SubscriptionConflict { .. })));
    }

    #[tokio::test]
    async fn each_subscription_gets_its_own_copy() {
        let bus = InMemoryBus::new();
        bus.ensure_topic("events.test").await.unwrap();
        bus.ensure_subscription("a-sub", "events.test").await.unwrap();
        bus.ensure_subscription("b-sub", "events.test").await.unwrap();

        bus.publish("events.test", message("m1")).await.unwrap();

        assert_eq!(bus.pending_count("a-sub"), 1);
        assert_eq!(bus.pending_count("b-sub"), 1);
    }

    #[tokio::test]
    async fn nack_redelivers_with_incremented_attempt() {
        let bus = InMemoryBus::new();
        bus_with_sub(&bus, "events.test", "svc-test-sub").await;
        bus.publish("events.test", message("m1")).await.unwrap();

        let mut sub = bus.subscribe("svc-test-sub").await.unwrap();
        let first = sub.recv().await.unwrap();
        assert_eq!(first.attempt(), 1);
        first.nack();

        let second = sub.recv().await.unwrap();
        assert_eq!(second.attempt(), 2);
        second.ack();
    }

    #[tokio::test]
    async fn dropping_a_delivery_redelivers() {
        let bus = InMemoryBus::new();
        bus_with_sub(&bus, "events.test", "svc-test-sub").await;
        bus.publish("events.test", message("m1")).await.unwrap();

        let mut sub = bus.subscribe("svc-test-sub").await.unwrap();
        {
            let _dropped = sub.recv().await.unwrap();
        }
        let redelivered = sub.recv().await.unwrap();
        assert_eq!(redelivered.attempt(), 2);
        redelivered.ack();
    }

    #[tokio::test]
    async fn poison_message_is_dead_lettered() {
        let bus = InMemoryBus::with_max_deliveries(3);
        bus_with_sub(&bus, "events.test", "svc-test-sub").await;
        bus.publish("events.test", message("poison")).await.unwrap();

        let mut sub = bus.subscribe("svc-test-sub").await.unwrap();
        for _ in 0..3 {
            sub.recv().await.unwrap().nack();
        }

        assert_eq!(bus.pending_count("svc-test-sub"), 0);
        assert_eq!(bus.dead_letter_count("svc-test-sub"), 1);
    }

    #[tokio::test]
    async fn recv_waits_for_later_publish() {
        let bus = InMemoryBus::new();
        bus_with_sub(&bus, "events.test", "svc-test-sub").await;

        let mut sub = bus.subscribe("svc-test-sub").await.unwrap();
        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                bus.publish("events.test", message("late")).await.unwrap();
            })
        };

        let delivery = sub.recv().await.unwrap();
        assert_eq!(delivery.message().data, b"late");
        delivery.ack();
        publisher.await.unwrap();
    }

    #[tokio::test]
    async fn close_wakes_consumers() {
        let bus = InMemoryBus::new();
        bus_with_sub(&bus, "events.test", "svc-test-sub").await;

        let mut sub = bus.subscribe("svc-test-sub").await.unwrap();
        let bus2 = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            bus2.close();
        });

        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn encoded_command_roundtrips_through_bus() {
        use messages::{Command, ReserveVehicleData};

        let bus = InMemoryBus::new();
        bus_with_sub(&bus, "commands.vehicle.reserve", "vehicle-sub").await;

        let txn = TransactionId::new();
        let cmd = Command::ReserveVehicle(ReserveVehicleData {
            transaction_id: txn,
            vehicle_id: common::VehicleId::new(),
        });
        let msg = BusMessage::encode(&cmd, txn).unwrap();
        bus.publish("commands.vehicle.reserve", msg).await.unwrap();

        let mut sub = bus.subscribe("vehicle-sub").await.unwrap();
        let delivery = sub.recv().await.unwrap();
        let decoded: Command = delivery.message().decode().unwrap();
        assert_eq!(decoded.transaction_id(), txn);
        delivery.ack();
    }
}
