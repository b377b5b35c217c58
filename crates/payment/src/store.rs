//! Payment store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::TransactionId;

use crate::code::{PaymentCode, PaymentCodeStatus};
use crate::error::{PaymentError, Result};
use crate::record::{PaymentRecord, PaymentStatus};

/// Outcome of inserting a freshly minted code.
#[derive(Debug, Clone)]
pub enum InsertCodeOutcome {
    Inserted,
    /// A code already exists for the transaction, or the code string
    /// collided with an existing one.
    Duplicate,
}

/// Outcome of a refund operation.
#[derive(Debug, Clone)]
pub enum RefundOutcome {
    /// The payment was marked refunded in this call.
    Refunded(PaymentRecord),
    /// The payment had already been refunded.
    AlreadyRefunded(PaymentRecord),
    /// The payment never completed, so there is nothing to return.
    CannotRefundFailed(PaymentRecord),
    /// No payment exists for the transaction.
    NotFound,
}

/// Persistence seam for payment codes and payment records.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a minted code, refusing duplicates per transaction and per
    /// code string.
    async fn insert_code(&self, code: PaymentCode) -> Result<InsertCodeOutcome>;

    /// Fetches a code by its opaque string.
    async fn get_code(&self, code: &str) -> Result<Option<PaymentCode>>;

    /// Fetches the code bound to a transaction.
    async fn get_code_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PaymentCode>>;

    /// Marks a code expired (observation or sweeper).
    async fn expire_code(&self, code: &str) -> Result<()>;

    /// Atomically marks the code used and inserts the completed payment.
    async fn commit_payment(&self, code: &str, record: PaymentRecord) -> Result<()>;

    /// Inserts a failed payment attempt without consuming the code.
    async fn record_failed_payment(&self, record: PaymentRecord) -> Result<()>;

    /// Fetches the payment bound to a transaction.
    async fn get_payment_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PaymentRecord>>;

    /// Marks the transaction's payment refunded, idempotently.
    async fn refund(&self, transaction_id: TransactionId) -> Result<RefundOutcome>;

    /// Marks every pending code at or past its expiry as expired. Returns
    /// how many codes were swept.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    /// Codes by code string.
    codes: HashMap<String, PaymentCode>,
    /// Code string by transaction.
    codes_by_transaction: HashMap<TransactionId, String>,
    /// Payments by transaction.
    payments: HashMap<TransactionId, PaymentRecord>,
}

/// In-memory payment store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentStore {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert_code(&self, code: PaymentCode) -> Result<InsertCodeOutcome> {
        let mut state = lock_write(&self.state)?;
        if state.codes.contains_key(&code.code)
            || state.codes_by_transaction.contains_key(&code.transaction_id)
        {
            return Ok(InsertCodeOutcome::Duplicate);
        }
        state
            .codes_by_transaction
            .insert(code.transaction_id, code.code.clone());
        state.codes.insert(code.code.clone(), code);
        Ok(InsertCodeOutcome::Inserted)
    }

    async fn get_code(&self, code: &str) -> Result<Option<PaymentCode>> {
        let state = lock_read(&self.state)?;
        Ok(state.codes.get(code).cloned())
    }

    async fn get_code_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PaymentCode>> {
        let state = lock_read(&self.state)?;
        Ok(state
            .codes_by_transaction
            .get(&transaction_id)
            .and_then(|code| state.codes.get(code))
            .cloned())
    }

    async fn expire_code(&self, code: &str) -> Result<()> {
        let mut state = lock_write(&self.state)?;
        if let Some(entry) = state.codes.get_mut(code)
            && entry.status == PaymentCodeStatus::Pending
        {
            entry.status = PaymentCodeStatus::Expired;
        }
        Ok(())
    }

    async fn commit_payment(&self, code: &str, record: PaymentRecord) -> Result<()> {
        let mut state = lock_write(&self.state)?;
        let entry = state
            .codes
            .get_mut(code)
            .ok_or_else(|| PaymentError::Store(format!("code vanished: {code}")))?;
        entry.status = PaymentCodeStatus::Used;
        state.payments.insert(record.transaction_id, record);
        Ok(())
    }

    async fn record_failed_payment(&self, record: PaymentRecord) -> Result<()> {
        let mut state = lock_write(&self.state)?;
        state.payments.insert(record.transaction_id, record);
        Ok(())
    }

    async fn get_payment_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<PaymentRecord>> {
        let state = lock_read(&self.state)?;
        Ok(state.payments.get(&transaction_id).cloned())
    }

    async fn refund(&self, transaction_id: TransactionId) -> Result<RefundOutcome> {
        let mut state = lock_write(&self.state)?;
        let Some(record) = state.payments.get_mut(&transaction_id) else {
            return Ok(RefundOutcome::NotFound);
        };
        match record.status {
            PaymentStatus::Refunded => Ok(RefundOutcome::AlreadyRefunded(record.clone())),
            PaymentStatus::Failed => Ok(RefundOutcome::CannotRefundFailed(record.clone())),
            PaymentStatus::Completed => {
                record.status = PaymentStatus::Refunded;
                Ok(RefundOutcome::Refunded(record.clone()))
            }
        }
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut state = lock_write(&self.state)?;
        let mut swept = 0;
        for code in state.codes.values_mut() {
            if code.status == PaymentCodeStatus::Pending && code.is_expired(now) {
                code.status = PaymentCodeStatus::Expired;
                swept += 1;
            }
        }
        Ok(swept)
    }
}

fn lock_read(
    state: &Arc<RwLock<InMemoryPaymentState>>,
) -> Result<std::sync::RwLockReadGuard<'_, InMemoryPaymentState>> {
    state
        .read()
        .map_err(|_| PaymentError::Store("payment store lock poisoned".into()))
}

fn lock_write(
    state: &Arc<RwLock<InMemoryPaymentState>>,
) -> Result<std::sync::RwLockWriteGuard<'_, InMemoryPaymentState>> {
    state
        .write()
        .map_err(|_| PaymentError::Store("payment store lock poisoned".into()))
}
