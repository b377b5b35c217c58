//! Command handler for the payment participant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bus::{BusMessage, MessageBus};
use chrono::Utc;
use messages::{
    Command, Event, GeneratePaymentCodeData, Naming, PaymentCodeGeneratedData,
    PaymentCodeGenerationFailedData, PaymentFailedData, PaymentProcessedData,
    PaymentRefundFailedData, PaymentRefundedData, ProcessPaymentData, RefundPaymentData,
};

use crate::code::{PaymentCode, PaymentCodeStatus};
use crate::error::Result;
use crate::record::{PaymentRecord, PaymentStatus};
use crate::store::{InsertCodeOutcome, PaymentStore, RefundOutcome};

/// Handles payment commands against the store and publishes the outcome
/// events.
pub struct PaymentHandler<S> {
    store: S,
    bus: Arc<dyn MessageBus>,
    naming: Naming,
    /// Test hook: when set, the next ProcessPayment is declined.
    fail_next_payment: AtomicBool,
}

impl<S: PaymentStore> PaymentHandler<S> {
    /// Creates a new handler.
    pub fn new(store: S, bus: Arc<dyn MessageBus>, naming: Naming) -> Self {
        Self {
            store,
            bus,
            naming,
            fail_next_payment: AtomicBool::new(false),
        }
    }

    /// Makes the next ProcessPayment fail with a simulated gateway decline.
    pub fn set_fail_next_payment(&self, fail: bool) {
        self.fail_next_payment.store(fail, Ordering::SeqCst);
    }

    /// Dispatches a decoded command.
    pub async fn handle(&self, command: &Command) -> Result<()> {
        match command {
            Command::GeneratePaymentCode(data) => self.handle_generate(data).await,
            Command::ProcessPayment(data) => self.handle_process(data).await,
            Command::RefundPayment(data) => self.handle_refund(data).await,
            other => {
                tracing::warn!(
                    command = other.command_type(),
                    "payment handler received foreign command"
                );
                Ok(())
            }
        }
    }

    #[tracing::instrument(skip(self, cmd), fields(transaction_id = %cmd.transaction_id))]
    async fn handle_generate(&self, cmd: &GeneratePaymentCodeData) -> Result<()> {
        metrics::counter!("payment_commands_total", "command" => "generate_code").increment(1);

        // A transaction keeps its first code: redelivery re-announces it.
        if let Some(existing) = self.store.get_code_for_transaction(cmd.transaction_id).await? {
            tracing::info!(code = %existing.code, "re-emitting existing payment code");
            return self.publish(code_generated(&existing)).await;
        }

        let code = PaymentCode::mint(
            cmd.transaction_id,
            cmd.customer_id,
            cmd.vehicle_id,
            cmd.amount,
            cmd.payment_type,
            Utc::now(),
        );
        match self.store.insert_code(code.clone()).await? {
            InsertCodeOutcome::Inserted => {
                tracing::info!(code = %code.code, "payment code generated");
                self.publish(code_generated(&code)).await
            }
            InsertCodeOutcome::Duplicate => {
                tracing::warn!("payment code uniqueness violation");
                self.publish(Event::PaymentCodeGenerationFailed(
                    PaymentCodeGenerationFailedData {
                        transaction_id: cmd.transaction_id,
                        customer_id: cmd.customer_id,
                        vehicle_id: cmd.vehicle_id,
                        amount: cmd.amount,
                        payment_type: cmd.payment_type,
                        reason: "Duplicate payment code for transaction".to_string(),
                        timestamp: Utc::now(),
                    },
                ))
                .await
            }
        }
    }

    #[tracing::instrument(skip(self, cmd), fields(transaction_id = %cmd.transaction_id))]
    async fn handle_process(&self, cmd: &ProcessPaymentData) -> Result<()> {
        metrics::counter!("payment_commands_total", "command" => "process").increment(1);

        // Idempotence: a transaction that already settled re-announces its
        // terminal outcome, whatever happened to the code since.
        if let Some(existing) = self
            .store
            .get_payment_for_transaction(cmd.transaction_id)
            .await?
        {
            tracing::info!(
                payment_id = %existing.payment_id,
                status = %existing.status,
                "re-emitting existing payment outcome"
            );
            let event = match existing.status {
                PaymentStatus::Completed => payment_processed(&existing),
                PaymentStatus::Failed | PaymentStatus::Refunded => {
                    payment_failed_for_code_holder(
                        cmd,
                        &existing,
                        format!("Payment already exists with status: {}", existing.status),
                    )
                }
            };
            return self.publish(event).await;
        }

        let Some(code) = self.store.get_code(&cmd.payment_code).await? else {
            return self
                .publish(Event::PaymentFailed(PaymentFailedData {
                    transaction_id: cmd.transaction_id,
                    payment_code: cmd.payment_code.clone(),
                    customer_id: None,
                    vehicle_id: None,
                    amount: None,
                    payment_type: None,
                    reason: "Payment code not found".to_string(),
                    timestamp: Utc::now(),
                }))
                .await;
        };

        let now = Utc::now();
        if code.status == PaymentCodeStatus::Used {
            return self
                .publish(payment_failed(cmd, &code, "Payment code already used"))
                .await;
        }
        if code.status == PaymentCodeStatus::Expired || code.is_expired(now) {
            self.store.expire_code(&code.code).await?;
            return self
                .publish(payment_failed(cmd, &code, "Payment code expired"))
                .await;
        }

        if self.fail_next_payment.swap(false, Ordering::SeqCst) {
            let record = PaymentRecord::new(
                cmd.transaction_id,
                code.code.clone(),
                code.customer_id,
                code.vehicle_id,
                code.amount,
                code.payment_type,
                cmd.payment_method.clone(),
                PaymentStatus::Failed,
                now,
            );
            self.store.record_failed_payment(record).await?;
            metrics::counter!("payments_failed").increment(1);
            return self
                .publish(payment_failed(cmd, &code, "Payment declined by gateway"))
                .await;
        }

        let record = PaymentRecord::new(
            cmd.transaction_id,
            code.code.clone(),
            code.customer_id,
            code.vehicle_id,
            code.amount,
            code.payment_type,
            cmd.payment_method.clone(),
            PaymentStatus::Completed,
            now,
        );
        self.store.commit_payment(&code.code, record.clone()).await?;
        metrics::counter!("payments_completed").increment(1);
        tracing::info!(payment_id = %record.payment_id, "payment processed");
        self.publish(payment_processed(&record)).await
    }

    #[tracing::instrument(skip(self, cmd), fields(transaction_id = %cmd.transaction_id))]
    async fn handle_refund(&self, cmd: &RefundPaymentData) -> Result<()> {
        metrics::counter!("payment_commands_total", "command" => "refund").increment(1);

        // Refunds are tied to the saga, not the payment id alone.
        let event = match self.store.refund(cmd.transaction_id).await? {
            RefundOutcome::Refunded(record) | RefundOutcome::AlreadyRefunded(record) => {
                tracing::info!(payment_id = %record.payment_id, "payment refunded");
                metrics::counter!("payments_refunded").increment(1);
                Event::PaymentRefunded(PaymentRefundedData {
                    transaction_id: cmd.transaction_id,
                    payment_id: record.payment_id,
                    status: PaymentStatus::Refunded.to_string(),
                    timestamp: Utc::now(),
                })
            }
            RefundOutcome::CannotRefundFailed(record) => {
                tracing::warn!(payment_id = %record.payment_id, "refund of failed payment refused");
                Event::PaymentRefundFailed(PaymentRefundFailedData {
                    transaction_id: cmd.transaction_id,
                    payment_id: record.payment_id,
                    reason: "Cannot refund a failed payment".to_string(),
                    timestamp: Utc::now(),
                })
            }
            RefundOutcome::NotFound => {
                tracing::warn!("refund for unknown payment refused");
                Event::PaymentRefundFailed(PaymentRefundFailedData {
                    transaction_id: cmd.transaction_id,
                    payment_id: cmd.payment_id.clone(),
                    reason: "Payment not found".to_string(),
                    timestamp: Utc::now(),
                })
            }
        };
        self.publish(event).await
    }

    async fn publish(&self, event: Event) -> Result<()> {
        let message = BusMessage::encode(&event, event.transaction_id())?;
        let topic = self.naming.topic(event.topic());
        self.bus.publish(&topic, message).await?;
        Ok(())
    }
}

fn code_generated(code: &PaymentCode) -> Event {
    Event::PaymentCodeGenerated(PaymentCodeGeneratedData {
        transaction_id: code.transaction_id,
        payment_code: code.code.clone(),
        customer_id: code.customer_id,
        vehicle_id: code.vehicle_id,
        amount: code.amount,
        payment_type: code.payment_type,
        expires_at: code.expires_at,
        timestamp: Utc::now(),
    })
}

fn payment_processed(record: &PaymentRecord) -> Event {
    Event::PaymentProcessed(PaymentProcessedData {
        transaction_id: record.transaction_id,
        payment_id: record.payment_id.clone(),
        payment_code: record.payment_code.clone(),
        customer_id: record.customer_id,
        vehicle_id: record.vehicle_id,
        amount: record.amount,
        payment_type: record.payment_type,
        payment_method: record.payment_method.clone(),
        status: record.status.to_string(),
        timestamp: Utc::now(),
    })
}

fn payment_failed(cmd: &ProcessPaymentData, code: &PaymentCode, reason: &str) -> Event {
    Event::PaymentFailed(PaymentFailedData {
        transaction_id: cmd.transaction_id,
        payment_code: cmd.payment_code.clone(),
        customer_id: Some(code.customer_id),
        vehicle_id: Some(code.vehicle_id),
        amount: Some(code.amount),
        payment_type: Some(code.payment_type),
        reason: reason.to_string(),
        timestamp: Utc::now(),
    })
}

fn payment_failed_for_code_holder(
    cmd: &ProcessPaymentData,
    record: &PaymentRecord,
    reason: String,
) -> Event {
    Event::PaymentFailed(PaymentFailedData {
        transaction_id: cmd.transaction_id,
        payment_code: cmd.payment_code.clone(),
        customer_id: Some(record.customer_id),
        vehicle_id: Some(record.vehicle_id),
        amount: Some(record.amount),
        payment_type: Some(record.payment_type),
        reason,
        timestamp: Utc::now(),
    })
}
