//! Credit store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CustomerId, Money, PaymentType, TransactionId};

use crate::account::{CreditAccount, ReserveRejection};
use crate::error::{CreditError, Result};

/// Outcome of a reserve operation.
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    /// Funds were debited in this call.
    Applied(CreditAccount),
    /// The transaction had already touched this account; nothing changed.
    AlreadyApplied(CreditAccount),
    /// A domain rule refused the reservation.
    Rejected(ReserveRejection),
}

/// Outcome of a release operation. A release always results in a
/// `CreditReleased` event, whatever the outcome.
#[derive(Debug, Clone)]
pub enum ReleaseOutcome {
    /// The recorded reservation was reversed in this call.
    Applied(CreditAccount),
    /// The reservation had already been reversed; nothing changed.
    AlreadyApplied(CreditAccount),
    /// No reservation to reverse (unknown customer, or the release arrived
    /// before the reserve — in which case a later reserve is suppressed).
    NoEffect,
}

/// Persistence seam for credit accounts.
///
/// `reserve` and `release` are single atomic operations: the funding rules,
/// the account mutation, and the applied-operation ledger entry commit
/// together, which is what makes redelivered commands harmless.
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Inserts a new account.
    async fn insert(&self, account: CreditAccount) -> Result<()>;

    /// Fetches an account by customer id.
    async fn get(&self, customer_id: CustomerId) -> Result<Option<CreditAccount>>;

    /// Reserves funds for a transaction, idempotently.
    async fn reserve(
        &self,
        transaction_id: TransactionId,
        customer_id: CustomerId,
        amount: Money,
        payment_type: PaymentType,
    ) -> Result<ReserveOutcome>;

    /// Releases previously reserved funds, idempotently.
    async fn release(
        &self,
        transaction_id: TransactionId,
        customer_id: CustomerId,
        amount: Money,
        payment_type: PaymentType,
    ) -> Result<ReleaseOutcome>;
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    amount: Money,
    payment_type: PaymentType,
    released: bool,
}

#[derive(Debug, Default)]
struct InMemoryCreditState {
    accounts: HashMap<CustomerId, CreditAccount>,
    ledger: HashMap<(TransactionId, CustomerId), LedgerEntry>,
}

/// In-memory credit store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCreditStore {
    state: Arc<RwLock<InMemoryCreditState>>,
}

impl InMemoryCreditStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CreditStore for InMemoryCreditStore {
    async fn insert(&self, account: CreditAccount) -> Result<()> {
        let mut state = lock_write(&self.state)?;
        state.accounts.insert(account.customer_id, account);
        Ok(())
    }

    async fn get(&self, customer_id: CustomerId) -> Result<Option<CreditAccount>> {
        let state = lock_read(&self.state)?;
        Ok(state.accounts.get(&customer_id).cloned())
    }

    async fn reserve(
        &self,
        transaction_id: TransactionId,
        customer_id: CustomerId,
        amount: Money,
        payment_type: PaymentType,
    ) -> Result<ReserveOutcome> {
        let mut state = lock_write(&self.state)?;

        if state.ledger.contains_key(&(transaction_id, customer_id)) {
            let account = state
                .accounts
                .get(&customer_id)
                .cloned()
                .ok_or_else(|| CreditError::Store("ledger entry without account".into()))?;
            return Ok(ReserveOutcome::AlreadyApplied(account));
        }

        let Some(account) = state.accounts.get_mut(&customer_id) else {
            return Ok(ReserveOutcome::Rejected(ReserveRejection::CustomerNotFound));
        };

        if let Err(rejection) = account.reserve(amount, payment_type) {
            return Ok(ReserveOutcome::Rejected(rejection));
        }
        let snapshot = account.clone();
        state.ledger.insert(
            (transaction_id, customer_id),
            LedgerEntry {
                amount,
                payment_type,
                released: false,
            },
        );
        Ok(ReserveOutcome::Applied(snapshot))
    }

    async fn release(
        &self,
        transaction_id: TransactionId,
        customer_id: CustomerId,
        amount: Money,
        payment_type: PaymentType,
    ) -> Result<ReleaseOutcome> {
        let mut state = lock_write(&self.state)?;

        match state.ledger.get(&(transaction_id, customer_id)).cloned() {
            Some(entry) if entry.released => {
                let account = state.accounts.get(&customer_id).cloned();
                Ok(match account {
                    Some(account) => ReleaseOutcome::AlreadyApplied(account),
                    None => ReleaseOutcome::NoEffect,
                })
            }
            Some(entry) => {
                // Reverse what was actually reserved, not what the command
                // claims, then mark the entry released.
                let Some(account) = state.accounts.get_mut(&customer_id) else {
                    return Ok(ReleaseOutcome::NoEffect);
                };
                account.release(entry.amount, entry.payment_type);
                let snapshot = account.clone();
                if let Some(entry) = state.ledger.get_mut(&(transaction_id, customer_id)) {
                    entry.released = true;
                }
                Ok(ReleaseOutcome::Applied(snapshot))
            }
            None => {
                // Release arrived before (or without) a reserve. Record a
                // released entry so a late reserve for the same transaction
                // is suppressed instead of debiting funds nobody will return.
                state.ledger.insert(
                    (transaction_id, customer_id),
                    LedgerEntry {
                        amount,
                        payment_type,
                        released: true,
                    },
                );
                Ok(ReleaseOutcome::NoEffect)
            }
        }
    }
}

fn lock_read(
    state: &Arc<RwLock<InMemoryCreditState>>,
) -> Result<std::sync::RwLockReadGuard<'_, InMemoryCreditState>> {
    state
        .read()
        .map_err(|_| CreditError::Store("credit store lock poisoned".into()))
}

fn lock_write(
    state: &Arc<RwLock<InMemoryCreditState>>,
) -> Result<std::sync::RwLockWriteGuard<'_, InMemoryCreditState>> {
    state
        .write()
        .map_err(|_| CreditError::Store("credit store lock poisoned".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_account(balance: i64, limit: i64) -> (InMemoryCreditStore, CustomerId) {
        let store = InMemoryCreditStore::new();
        let customer_id = CustomerId::new();
        store
            .insert(CreditAccount::new(
                customer_id,
                Money::from_cents(balance),
                Money::from_cents(limit),
            ))
            .await
            .unwrap();
        (store, customer_id)
    }

    #[tokio::test]
    async fn reserve_then_release_restores_account() {
        let (store, customer_id) = store_with_account(6_000_000, 0).await;
        let txn = TransactionId::new();
        let amount = Money::from_cents(4_500_000);

        store
            .reserve(txn, customer_id, amount, PaymentType::Cash)
            .await
            .unwrap();
        store
            .release(txn, customer_id, amount, PaymentType::Cash)
            .await
            .unwrap();

        let account = store.get(customer_id).await.unwrap().unwrap();
        assert_eq!(account.account_balance, Money::from_cents(6_000_000));
        assert_eq!(account.used_credit, Money::zero());
    }

    #[tokio::test]
    async fn redelivered_reserve_debits_once() {
        let (store, customer_id) = store_with_account(6_000_000, 0).await;
        let txn = TransactionId::new();
        let amount = Money::from_cents(4_500_000);

        let first = store
            .reserve(txn, customer_id, amount, PaymentType::Cash)
            .await
            .unwrap();
        assert!(matches!(first, ReserveOutcome::Applied(_)));

        let second = store
            .reserve(txn, customer_id, amount, PaymentType::Cash)
            .await
            .unwrap();
        assert!(matches!(second, ReserveOutcome::AlreadyApplied(_)));

        let account = store.get(customer_id).await.unwrap().unwrap();
        assert_eq!(account.account_balance, Money::from_cents(1_500_000));
    }

    #[tokio::test]
    async fn redelivered_release_credits_once() {
        let (store, customer_id) = store_with_account(0, 6_000_000).await;
        let txn = TransactionId::new();
        let amount = Money::from_cents(5_000_000);

        store
            .reserve(txn, customer_id, amount, PaymentType::Credit)
            .await
            .unwrap();
        let first = store
            .release(txn, customer_id, amount, PaymentType::Credit)
            .await
            .unwrap();
        assert!(matches!(first, ReleaseOutcome::Applied(_)));

        let second = store
            .release(txn, customer_id, amount, PaymentType::Credit)
            .await
            .unwrap();
        assert!(matches!(second, ReleaseOutcome::AlreadyApplied(_)));

        let account = store.get(customer_id).await.unwrap().unwrap();
        assert_eq!(account.used_credit, Money::zero());
    }

    #[tokio::test]
    async fn release_before_reserve_suppresses_the_late_reserve() {
        let (store, customer_id) = store_with_account(6_000_000, 0).await;
        let txn = TransactionId::new();
        let amount = Money::from_cents(4_500_000);

        let release = store
            .release(txn, customer_id, amount, PaymentType::Cash)
            .await
            .unwrap();
        assert!(matches!(release, ReleaseOutcome::NoEffect));

        let reserve = store
            .reserve(txn, customer_id, amount, PaymentType::Cash)
            .await
            .unwrap();
        assert!(matches!(reserve, ReserveOutcome::AlreadyApplied(_)));

        let account = store.get(customer_id).await.unwrap().unwrap();
        assert_eq!(account.account_balance, Money::from_cents(6_000_000));
    }

    #[tokio::test]
    async fn reserve_unknown_customer_is_rejected() {
        let store = InMemoryCreditStore::new();
        let outcome = store
            .reserve(
                TransactionId::new(),
                CustomerId::new(),
                Money::from_cents(100),
                PaymentType::Cash,
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ReserveOutcome::Rejected(ReserveRejection::CustomerNotFound)
        ));
    }

    #[tokio::test]
    async fn release_unknown_customer_has_no_effect() {
        let store = InMemoryCreditStore::new();
        let outcome = store
            .release(
                TransactionId::new(),
                CustomerId::new(),
                Money::from_cents(100),
                PaymentType::Cash,
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ReleaseOutcome::NoEffect));
    }

    #[tokio::test]
    async fn rejected_reserve_leaves_no_ledger_entry() {
        let (store, customer_id) = store_with_account(100, 0).await;
        let txn = TransactionId::new();

        let outcome = store
            .reserve(txn, customer_id, Money::from_cents(200), PaymentType::Cash)
            .await
            .unwrap();
        assert!(matches!(outcome, ReserveOutcome::Rejected(_)));

        // A retry (e.g. after a top-up) is evaluated fresh.
        store
            .insert(CreditAccount::new(
                customer_id,
                Money::from_cents(200),
                Money::zero(),
            ))
            .await
            .unwrap();
        let retry = store
            .reserve(txn, customer_id, Money::from_cents(200), PaymentType::Cash)
            .await
            .unwrap();
        assert!(matches!(retry, ReserveOutcome::Applied(_)));
    }
}
