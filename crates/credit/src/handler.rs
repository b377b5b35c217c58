//! Command handler for the credit participant.

use std::sync::Arc;

use bus::{BusMessage, MessageBus};
use chrono::Utc;
use messages::{
    Command, CreditReleasedData, CreditReservationFailedData, CreditReservedData, Event, Naming,
    ReleaseCreditData, ReserveCreditData,
};

use crate::error::Result;
use crate::store::{CreditStore, ReleaseOutcome, ReserveOutcome};

/// Handles credit commands against the store and publishes the outcome
/// events.
pub struct CreditHandler<S> {
    store: S,
    bus: Arc<dyn MessageBus>,
    naming: Naming,
}

impl<S: CreditStore> CreditHandler<S> {
    /// Creates a new handler.
    pub fn new(store: S, bus: Arc<dyn MessageBus>, naming: Naming) -> Self {
        Self { store, bus, naming }
    }

    /// Dispatches a decoded command. Commands for other participants are
    /// ignored with a warning (they indicate a wiring mistake, not an error).
    pub async fn handle(&self, command: &Command) -> Result<()> {
        match command {
            Command::ReserveCredit(data) => self.handle_reserve(data).await,
            Command::ReleaseCredit(data) => self.handle_release(data).await,
            other => {
                tracing::warn!(
                    command = other.command_type(),
                    "credit handler received foreign command"
                );
                Ok(())
            }
        }
    }

    #[tracing::instrument(skip(self, cmd), fields(transaction_id = %cmd.transaction_id))]
    async fn handle_reserve(&self, cmd: &ReserveCreditData) -> Result<()> {
        metrics::counter!("credit_commands_total", "command" => "reserve").increment(1);

        let outcome = self
            .store
            .reserve(cmd.transaction_id, cmd.customer_id, cmd.amount, cmd.payment_type)
            .await?;

        let event = match outcome {
            ReserveOutcome::Applied(account) | ReserveOutcome::AlreadyApplied(account) => {
                tracing::info!(customer_id = %cmd.customer_id, "credit reserved");
                Event::CreditReserved(CreditReservedData {
                    transaction_id: cmd.transaction_id,
                    customer_id: cmd.customer_id,
                    amount: cmd.amount,
                    payment_type: cmd.payment_type,
                    remaining_balance: match cmd.payment_type {
                        common::PaymentType::Cash => Some(account.account_balance),
                        common::PaymentType::Credit => None,
                    },
                    remaining_credit: match cmd.payment_type {
                        common::PaymentType::Cash => None,
                        common::PaymentType::Credit => Some(account.available_credit()),
                    },
                    timestamp: Utc::now(),
                })
            }
            ReserveOutcome::Rejected(rejection) => {
                tracing::warn!(
                    customer_id = %cmd.customer_id,
                    reason = rejection.reason(),
                    "credit reservation refused"
                );
                metrics::counter!("credit_reservations_failed").increment(1);
                Event::CreditReservationFailed(CreditReservationFailedData {
                    transaction_id: cmd.transaction_id,
                    customer_id: cmd.customer_id,
                    amount: cmd.amount,
                    payment_type: cmd.payment_type,
                    reason: rejection.reason().to_string(),
                    timestamp: Utc::now(),
                })
            }
        };

        self.publish(event).await
    }

    #[tracing::instrument(skip(self, cmd), fields(transaction_id = %cmd.transaction_id))]
    async fn handle_release(&self, cmd: &ReleaseCreditData) -> Result<()> {
        metrics::counter!("credit_commands_total", "command" => "release").increment(1);

        let outcome = self
            .store
            .release(cmd.transaction_id, cmd.customer_id, cmd.amount, cmd.payment_type)
            .await?;

        // Release is best-effort: the orchestrator only needs to know it can
        // advance, so every outcome emits CreditReleased.
        let (new_balance, new_available_credit) = match &outcome {
            ReleaseOutcome::Applied(account) | ReleaseOutcome::AlreadyApplied(account) => (
                Some(account.account_balance),
                Some(account.available_credit()),
            ),
            ReleaseOutcome::NoEffect => (None, None),
        };
        tracing::info!(customer_id = %cmd.customer_id, ?outcome, "credit released");

        self.publish(Event::CreditReleased(CreditReleasedData {
            transaction_id: cmd.transaction_id,
            customer_id: cmd.customer_id,
            amount: cmd.amount,
            payment_type: cmd.payment_type,
            new_balance,
            new_available_credit,
            timestamp: Utc::now(),
        }))
        .await
    }

    async fn publish(&self, event: Event) -> Result<()> {
        let message = BusMessage::encode(&event, event.transaction_id())?;
        let topic = self.naming.topic(event.topic());
        self.bus.publish(&topic, message).await?;
        Ok(())
    }
}
