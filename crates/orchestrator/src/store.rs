//! Saga store trait, transactional outbox types, and the in-memory
//! implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::TransactionId;
use messages::{Command, Event};
use thiserror::Error;
use uuid::Uuid;

use crate::saga::SagaRecord;

/// Errors that can occur when persisting saga state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A saga with this transaction id already exists.
    #[error("Duplicate transaction id: {0}")]
    DuplicateTransaction(TransactionId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row held a value outside the state machine's vocabulary.
    #[error("Corrupt saga row: {0}")]
    Corrupt(String),

    /// The in-memory store's lock was poisoned.
    #[error("Saga store lock poisoned")]
    Poisoned,
}

/// An outbound message persisted in the same transaction as the saga row,
/// published to the bus later by the outbox publisher.
#[derive(Debug, Clone)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub transaction_id: TransactionId,
    /// Short topic name; the publisher resolves it through the project
    /// naming scheme.
    pub topic: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    /// Wraps a command for its command topic.
    pub fn command(command: &Command, now: DateTime<Utc>) -> Result<Self, StoreError> {
        Ok(Self {
            id: Uuid::new_v4(),
            transaction_id: command.transaction_id(),
            topic: command.topic().to_string(),
            payload: serde_json::to_value(command)?,
            created_at: now,
        })
    }

    /// Wraps an orchestrator-owned event for its event topic.
    pub fn event(event: &Event, now: DateTime<Utc>) -> Result<Self, StoreError> {
        Ok(Self {
            id: Uuid::new_v4(),
            transaction_id: event.transaction_id(),
            topic: event.topic().to_string(),
            payload: serde_json::to_value(event)?,
            created_at: now,
        })
    }
}

/// Persistence seam for saga records and their outbox.
///
/// `save_with_outbox` is the one write the state machine needs: the new
/// record and its outbound messages commit atomically, so a crash between
/// commit and publish can never lose a command (the publisher will find it).
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Inserts the initial record. Fails on a duplicate transaction id.
    async fn insert(&self, saga: &SagaRecord) -> Result<(), StoreError>;

    /// Fetches a record by transaction id.
    async fn get(&self, transaction_id: TransactionId) -> Result<Option<SagaRecord>, StoreError>;

    /// Persists the record and enqueues outbox messages atomically.
    async fn save_with_outbox(
        &self,
        saga: &SagaRecord,
        outbox: &[OutboxMessage],
    ) -> Result<(), StoreError>;

    /// Fetches up to `limit` unpublished outbox messages, oldest first.
    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError>;

    /// Marks outbox messages as published.
    async fn mark_published(&self, ids: &[Uuid]) -> Result<(), StoreError>;

    /// Cheap reachability probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct InMemorySagaState {
    sagas: HashMap<TransactionId, SagaRecord>,
    outbox: Vec<(OutboxMessage, bool)>,
}

/// In-memory saga store with the same contract as the Postgres
/// implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemorySagaStore {
    state: Arc<RwLock<InMemorySagaState>>,
}

impl InMemorySagaStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages still waiting for the publisher (tests).
    pub fn unpublished_count(&self) -> usize {
        self.state
            .read()
            .map(|s| s.outbox.iter().filter(|(_, published)| !published).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn insert(&self, saga: &SagaRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        if state.sagas.contains_key(&saga.transaction_id) {
            return Err(StoreError::DuplicateTransaction(saga.transaction_id));
        }
        state.sagas.insert(saga.transaction_id, saga.clone());
        Ok(())
    }

    async fn get(&self, transaction_id: TransactionId) -> Result<Option<SagaRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.sagas.get(&transaction_id).cloned())
    }

    async fn save_with_outbox(
        &self,
        saga: &SagaRecord,
        outbox: &[OutboxMessage],
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.sagas.insert(saga.transaction_id, saga.clone());
        state
            .outbox
            .extend(outbox.iter().map(|m| (m.clone(), false)));
        Ok(())
    }

    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .outbox
            .iter()
            .filter(|(_, published)| !published)
            .take(limit)
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn mark_published(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        for (message, published) in &mut state.outbox {
            if ids.contains(&message.id) {
                *published = true;
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CustomerId, Money, PaymentType, VehicleId};
    use messages::ReserveCreditData;

    fn saga() -> SagaRecord {
        SagaRecord::new(
            TransactionId::new(),
            CustomerId::new(),
            VehicleId::new(),
            Money::from_cents(4_500_000),
            PaymentType::Cash,
            Utc::now(),
        )
    }

    fn reserve_credit(saga: &SagaRecord) -> Command {
        Command::ReserveCredit(ReserveCreditData {
            transaction_id: saga.transaction_id,
            customer_id: saga.customer_id,
            amount: saga.amount,
            payment_type: saga.payment_type,
        })
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemorySagaStore::new();
        let record = saga();
        store.insert(&record).await.unwrap();

        let loaded = store.get(record.transaction_id).await.unwrap().unwrap();
        assert_eq!(loaded.transaction_id, record.transaction_id);

        assert!(store.get(TransactionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_refused() {
        let store = InMemorySagaStore::new();
        let record = saga();
        store.insert(&record).await.unwrap();

        let err = store.insert(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTransaction(_)));
    }

    #[tokio::test]
    async fn outbox_lifecycle() {
        let store = InMemorySagaStore::new();
        let record = saga();
        store.insert(&record).await.unwrap();

        let msg = OutboxMessage::command(&reserve_credit(&record), Utc::now()).unwrap();
        store.save_with_outbox(&record, &[msg.clone()]).await.unwrap();
        assert_eq!(store.unpublished_count(), 1);

        let pending = store.fetch_unpublished(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].topic, "commands.credit.reserve");
        assert_eq!(pending[0].transaction_id, record.transaction_id);

        store.mark_published(&[msg.id]).await.unwrap();
        assert_eq!(store.unpublished_count(), 0);
        assert!(store.fetch_unpublished(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_unpublished_respects_limit_and_order() {
        let store = InMemorySagaStore::new();
        let record = saga();
        store.insert(&record).await.unwrap();

        let msgs: Vec<OutboxMessage> = (0..3)
            .map(|_| OutboxMessage::command(&reserve_credit(&record), Utc::now()).unwrap())
            .collect();
        store.save_with_outbox(&record, &msgs).await.unwrap();

        let first_two = store.fetch_unpublished(2).await.unwrap();
        assert_eq!(first_two.len(), 2);
        assert_eq!(first_two[0].id, msgs[0].id);
        assert_eq!(first_two[1].id, msgs[1].id);
    }
}
