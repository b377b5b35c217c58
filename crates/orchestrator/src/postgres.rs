//! PostgreSQL-backed saga store.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, Money, PaymentType, TransactionId, VehicleId};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::saga::{SagaContext, SagaRecord};
use crate::status::SagaStatus;
use crate::step::SagaStep;
use crate::store::{OutboxMessage, SagaStore, StoreError};

/// PostgreSQL saga store. The saga row and its outbox messages commit in
/// one transaction; the row update takes the row lock that serializes
/// concurrent writers on the same saga.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_saga(row: PgRow) -> Result<SagaRecord, StoreError> {
        let payment_type: String = row.try_get("payment_type")?;
        let status: String = row.try_get("status")?;
        let current_step: String = row.try_get("current_step")?;
        let context: serde_json::Value = row.try_get("context")?;
        let context: SagaContext = serde_json::from_value(context)?;

        Ok(SagaRecord {
            transaction_id: TransactionId::from_uuid(row.try_get::<Uuid, _>("transaction_id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            vehicle_id: VehicleId::from_uuid(row.try_get::<Uuid, _>("vehicle_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            payment_type: PaymentType::from_str(&payment_type)
                .map_err(StoreError::Corrupt)?,
            status: SagaStatus::parse(&status)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown status: {status}")))?,
            current_step: SagaStep::parse(&current_step)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown step: {current_step}")))?,
            context,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_outbox(row: PgRow) -> Result<OutboxMessage, StoreError> {
        Ok(OutboxMessage {
            id: row.try_get("id")?,
            transaction_id: TransactionId::from_uuid(row.try_get::<Uuid, _>("transaction_id")?),
            topic: row.try_get("topic")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    async fn insert(&self, saga: &SagaRecord) -> Result<(), StoreError> {
        let context = serde_json::to_value(&saga.context)?;
        sqlx::query(
            r#"
            INSERT INTO saga_states
                (transaction_id, customer_id, vehicle_id, amount_cents,
                 payment_type, status, current_step, context, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(saga.transaction_id.as_uuid())
        .bind(saga.customer_id.as_uuid())
        .bind(saga.vehicle_id.as_uuid())
        .bind(saga.amount.cents())
        .bind(saga.payment_type.as_str())
        .bind(saga.status.as_str())
        .bind(saga.current_step.as_str())
        .bind(context)
        .bind(saga.created_at)
        .bind(saga.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("saga_states_pkey")
            {
                return StoreError::DuplicateTransaction(saga.transaction_id);
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    async fn get(&self, transaction_id: TransactionId) -> Result<Option<SagaRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT transaction_id, customer_id, vehicle_id, amount_cents,
                   payment_type, status, current_step, context, created_at, updated_at
            FROM saga_states
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_saga).transpose()
    }

    async fn save_with_outbox(
        &self,
        saga: &SagaRecord,
        outbox: &[OutboxMessage],
    ) -> Result<(), StoreError> {
        let context = serde_json::to_value(&saga.context)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO saga_states
                (transaction_id, customer_id, vehicle_id, amount_cents,
                 payment_type, status, current_step, context, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (transaction_id) DO UPDATE SET
                status = EXCLUDED.status,
                current_step = EXCLUDED.current_step,
                context = EXCLUDED.context,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(saga.transaction_id.as_uuid())
        .bind(saga.customer_id.as_uuid())
        .bind(saga.vehicle_id.as_uuid())
        .bind(saga.amount.cents())
        .bind(saga.payment_type.as_str())
        .bind(saga.status.as_str())
        .bind(saga.current_step.as_str())
        .bind(context)
        .bind(saga.created_at)
        .bind(saga.updated_at)
        .execute(&mut *tx)
        .await?;

        for message in outbox {
            sqlx::query(
                r#"
                INSERT INTO outbox (id, transaction_id, topic, payload, published, created_at)
                VALUES ($1, $2, $3, $4, FALSE, $5)
                "#,
            )
            .bind(message.id)
            .bind(message.transaction_id.as_uuid())
            .bind(&message.topic)
            .bind(&message.payload)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, transaction_id, topic, payload, created_at
            FROM outbox
            WHERE NOT published
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_outbox).collect()
    }

    async fn mark_published(&self, ids: &[Uuid]) -> Result<(), StoreError> {
        sqlx::query("UPDATE outbox SET published = TRUE WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
