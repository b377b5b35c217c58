//! The orchestrator's I/O shell.
//!
//! Wraps the pure transition core with persistence, the transactional
//! outbox, the synchronous peer gateways, and per-transaction
//! serialization. All saga work for one `transaction_id` runs under that
//! transaction's async lock, so events racing in from different
//! subscriptions cannot interleave their read-modify-write cycles.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::{CustomerId, Money, PaymentType, TransactionId, VehicleId};
use messages::{Command, Event, ReserveCreditData};
use tokio::sync::Mutex;

use crate::error::{OrchestratorError, Result};
use crate::gateways::{CustomerGateway, VehicleGateway};
use crate::saga::{CustomerSnapshot, SagaRecord, VehicleSnapshot};
use crate::status::SagaStatus;
use crate::store::{OutboxMessage, SagaStore};
use crate::transition::{self, CancelOutcome, Directive, Transition};

/// Drives purchase sagas: starts them, applies participant events, and
/// handles cancellation requests.
pub struct Orchestrator<S> {
    store: Arc<S>,
    customers: Arc<dyn CustomerGateway>,
    vehicles: Arc<dyn VehicleGateway>,
    locks: Mutex<HashMap<TransactionId, Arc<Mutex<()>>>>,
}

impl<S: SagaStore> Orchestrator<S> {
    /// Creates a new orchestrator.
    pub fn new(
        store: Arc<S>,
        customers: Arc<dyn CustomerGateway>,
        vehicles: Arc<dyn VehicleGateway>,
    ) -> Self {
        Self {
            store,
            customers,
            vehicles,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a reference to the saga store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    async fn saga_lock(&self, transaction_id: TransactionId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(transaction_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn drop_lock(&self, transaction_id: TransactionId) {
        self.locks.lock().await.remove(&transaction_id);
    }

    /// Validates a purchase request, persists the initial saga, and
    /// enqueues the first command.
    #[tracing::instrument(skip(self))]
    pub async fn start_purchase(
        &self,
        customer_id: CustomerId,
        vehicle_id: VehicleId,
        payment_type: PaymentType,
    ) -> Result<SagaRecord> {
        let vehicle = self
            .vehicles
            .fetch(vehicle_id)
            .await?
            .ok_or(OrchestratorError::VehicleNotFound(vehicle_id))?;
        if vehicle.is_sold || vehicle.is_reserved {
            return Err(OrchestratorError::VehicleUnavailable(vehicle_id));
        }

        let customer = self
            .customers
            .fetch(customer_id)
            .await?
            .ok_or(OrchestratorError::CustomerNotFound(customer_id))?;
        let available: Money = match payment_type {
            PaymentType::Cash => customer.account_balance,
            PaymentType::Credit => customer.available_credit,
        };
        if vehicle.price > available {
            return Err(OrchestratorError::InsufficientFunds {
                required: vehicle.price,
                available,
            });
        }

        let now = Utc::now();
        let transaction_id = TransactionId::new();
        let mut saga = SagaRecord::new(
            transaction_id,
            customer_id,
            vehicle_id,
            vehicle.price,
            payment_type,
            now,
        );
        saga.context.customer_snapshot = Some(CustomerSnapshot {
            customer_id,
            account_balance: customer.account_balance,
            credit_limit: customer.credit_limit,
            available_credit: customer.available_credit,
        });
        saga.context.vehicle_snapshot = Some(VehicleSnapshot {
            vehicle_id,
            model: vehicle.model.clone(),
            price: vehicle.price,
            is_reserved: vehicle.is_reserved,
            is_sold: vehicle.is_sold,
        });
        self.store.insert(&saga).await?;

        // First command goes through the outbox together with the
        // STARTED → IN_PROGRESS transition.
        saga.status = SagaStatus::InProgress;
        saga.updated_at = now;
        let command = Command::ReserveCredit(ReserveCreditData {
            transaction_id,
            customer_id,
            amount: saga.amount,
            payment_type,
        });
        let result = match OutboxMessage::command(&command, now) {
            Ok(message) => self
                .store
                .save_with_outbox(&saga, &[message])
                .await
                .map_err(OrchestratorError::from),
            Err(err) => Err(OrchestratorError::from(err)),
        };
        if let Err(err) = result {
            tracing::error!(
                %transaction_id,
                error = %err,
                "failed to enqueue initial ReserveCredit command"
            );
            saga.status = SagaStatus::FailedInitialCommand;
            saga.context.error = Some(format!("Failed to publish initial command: {err}"));
            saga.updated_at = Utc::now();
            if let Err(save_err) = self.store.save_with_outbox(&saga, &[]).await {
                tracing::error!(%transaction_id, error = %save_err, "could not record initial-command failure");
            }
            return Err(OrchestratorError::InitialCommandFailed(err.to_string()));
        }

        metrics::counter!("saga_started_total").increment(1);
        tracing::info!(%transaction_id, amount = %saga.amount, %payment_type, "purchase saga started");
        Ok(saga)
    }

    /// Fetches a saga record.
    pub async fn get_saga(&self, transaction_id: TransactionId) -> Result<Option<SagaRecord>> {
        Ok(self.store.get(transaction_id).await?)
    }

    /// Applies a participant event to its saga.
    ///
    /// Unknown sagas and out-of-position events are ignored; the caller
    /// acks either way.
    #[tracing::instrument(skip(self, event), fields(event = event.event_type(), transaction_id = %event.transaction_id()))]
    pub async fn handle_event(&self, event: &Event) -> Result<()> {
        let transaction_id = event.transaction_id();
        let lock = self.saga_lock(transaction_id).await;
        let _guard = lock.lock().await;

        let Some(saga) = self.store.get(transaction_id).await? else {
            tracing::warn!("event for unknown saga ignored");
            return Ok(());
        };

        let Some(transition) = transition::on_event(&saga, event, Utc::now()) else {
            tracing::debug!(
                status = %saga.status,
                step = %saga.current_step,
                "event does not apply at this position, ignored"
            );
            return Ok(());
        };

        let status = self.apply(transition).await?;
        if status.is_terminal() {
            // Shed the lock entry; a late redelivery recreates it.
            self.drop_lock(transaction_id).await;
        }
        Ok(())
    }

    /// Handles an external cancellation request, returning the updated
    /// record on acceptance.
    #[tracing::instrument(skip(self, reason))]
    pub async fn request_cancellation(
        &self,
        transaction_id: TransactionId,
        reason: &str,
    ) -> Result<SagaRecord> {
        let lock = self.saga_lock(transaction_id).await;
        let _guard = lock.lock().await;

        let Some(saga) = self.store.get(transaction_id).await? else {
            return Err(OrchestratorError::SagaNotFound(transaction_id));
        };

        match transition::request_cancellation(&saga, reason, Utc::now()) {
            CancelOutcome::AlreadyCancelling => {
                Err(OrchestratorError::CancellationInProgress(transaction_id))
            }
            CancelOutcome::NotCancellable(status) => {
                Err(OrchestratorError::NotCancellable(status))
            }
            CancelOutcome::Rejected(transition) => {
                let refusal = transition
                    .saga
                    .context
                    .cancellation_reason
                    .clone()
                    .unwrap_or_else(|| "Cancellation rejected".to_string());
                let step = saga.current_step;
                self.apply(transition).await?;
                metrics::counter!("saga_cancellations_rejected").increment(1);
                Err(OrchestratorError::CancellationRejected {
                    reason: refusal,
                    current_step: step,
                })
            }
            CancelOutcome::Accepted(requested) => {
                // Persist the CANCELLATION_REQUESTED marker, then enter the
                // cancellation sub-machine; both happen under the saga lock.
                self.store.save_with_outbox(&requested.saga, &[]).await?;
                let Some(dispatched) =
                    transition::dispatch_cancellation(&requested.saga, Utc::now())
                else {
                    return Ok(requested.saga);
                };
                let record = dispatched.saga.clone();
                self.apply(dispatched).await?;
                metrics::counter!("saga_cancellations_requested").increment(1);
                tracing::info!(%transaction_id, step = %record.current_step, "cancellation dispatched");
                Ok(record)
            }
        }
    }

    /// Persists a transition and performs its effects, returning the final
    /// status (including a mark-as-sold follow-up).
    async fn apply(&self, transition: Transition) -> Result<SagaStatus> {
        let now = Utc::now();
        let mut outbox = Vec::new();
        let mut mark_sold: Option<VehicleId> = None;
        for directive in &transition.directives {
            match directive {
                Directive::Publish(command) => {
                    outbox.push(OutboxMessage::command(command, now)?);
                }
                Directive::Emit(event) => {
                    outbox.push(OutboxMessage::event(event, now)?);
                }
                Directive::MarkVehicleSold { vehicle_id } => mark_sold = Some(*vehicle_id),
            }
        }

        let saga = transition.saga;
        self.store.save_with_outbox(&saga, &outbox).await?;
        self.record_outcome(&saga);
        let mut status = saga.status;

        if let Some(vehicle_id) = mark_sold {
            let follow_up = match self.vehicles.mark_as_sold(vehicle_id).await {
                Ok(_) => {
                    tracing::info!(%vehicle_id, "vehicle marked as sold");
                    transition::on_vehicle_sold(&saga, Utc::now())
                }
                Err(err) => {
                    tracing::error!(%vehicle_id, error = %err, "mark-as-sold call failed");
                    transition::on_vehicle_sold_failed(&saga, &err.to_string(), Utc::now())
                }
            };
            if let Some(follow_up) = follow_up {
                self.store.save_with_outbox(&follow_up.saga, &[]).await?;
                self.record_outcome(&follow_up.saga);
                status = follow_up.saga.status;
            }
        }
        Ok(status)
    }

    fn record_outcome(&self, saga: &SagaRecord) {
        if !saga.status.is_terminal() {
            return;
        }
        let elapsed = (saga.updated_at - saga.created_at)
            .to_std()
            .unwrap_or_default()
            .as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(elapsed);
        match saga.status {
            SagaStatus::Completed => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(transaction_id = %saga.transaction_id, "saga completed");
            }
            SagaStatus::Cancelled => {
                metrics::counter!("saga_cancelled").increment(1);
                tracing::info!(transaction_id = %saga.transaction_id, "saga cancelled");
            }
            SagaStatus::FailedRequiresManualIntervention => {
                metrics::counter!("saga_requires_manual_intervention").increment(1);
                tracing::error!(
                    transaction_id = %saga.transaction_id,
                    error = ?saga.context.compensation_error.as_ref().or(saga.context.error.as_ref()),
                    "saga requires manual intervention"
                );
            }
            _ => {
                metrics::counter!("saga_failed").increment(1);
                tracing::warn!(
                    transaction_id = %saga.transaction_id,
                    status = %saga.status,
                    error = ?saga.context.error,
                    "saga failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::{CustomerSummary, GatewayError, VehicleSummary};
    use crate::step::SagaStep;
    use crate::store::InMemorySagaStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::RwLock;

    #[derive(Default)]
    struct StubCustomerGateway {
        customer: RwLock<Option<CustomerSummary>>,
    }

    #[async_trait]
    impl CustomerGateway for StubCustomerGateway {
        async fn fetch(&self, _: CustomerId) -> std::result::Result<Option<CustomerSummary>, GatewayError> {
            Ok(self.customer.read().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct StubVehicleGateway {
        vehicle: RwLock<Option<VehicleSummary>>,
        fail_mark_sold: AtomicBool,
    }

    #[async_trait]
    impl VehicleGateway for StubVehicleGateway {
        async fn fetch(&self, _: VehicleId) -> std::result::Result<Option<VehicleSummary>, GatewayError> {
            Ok(self.vehicle.read().unwrap().clone())
        }

        async fn mark_as_sold(
            &self,
            vehicle_id: VehicleId,
        ) -> std::result::Result<VehicleSummary, GatewayError> {
            if self.fail_mark_sold.load(Ordering::SeqCst) {
                return Err(GatewayError::UnexpectedStatus {
                    status: 503,
                    url: format!("/vehicles/{vehicle_id}/mark_as_sold"),
                });
            }
            let mut vehicle = self
                .vehicle
                .read()
                .unwrap()
                .clone()
                .expect("vehicle seeded");
            vehicle.is_sold = true;
            vehicle.is_reserved = false;
            Ok(vehicle)
        }
    }

    struct Fixture {
        orchestrator: Orchestrator<InMemorySagaStore>,
        store: Arc<InMemorySagaStore>,
        customers: Arc<StubCustomerGateway>,
        vehicles: Arc<StubVehicleGateway>,
        customer_id: CustomerId,
        vehicle_id: VehicleId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemorySagaStore::new());
        let customers = Arc::new(StubCustomerGateway::default());
        let vehicles = Arc::new(StubVehicleGateway::default());
        let customer_id = CustomerId::new();
        let vehicle_id = VehicleId::new();

        *customers.customer.write().unwrap() = Some(CustomerSummary {
            id: customer_id,
            account_balance: Money::from_cents(6_000_000),
            credit_limit: Money::from_cents(2_000_000),
            available_credit: Money::from_cents(2_000_000),
        });
        *vehicles.vehicle.write().unwrap() = Some(VehicleSummary {
            id: vehicle_id,
            model: "Onix 1.0".into(),
            price: Money::from_cents(4_500_000),
            is_reserved: false,
            is_sold: false,
        });

        let orchestrator =
            Orchestrator::new(store.clone(), customers.clone(), vehicles.clone());
        Fixture {
            orchestrator,
            store,
            customers,
            vehicles,
            customer_id,
            vehicle_id,
        }
    }

    /// Feeds the saga the participant events a healthy run would produce,
    /// straight into the shell, up to the payment.
    async fn drive_to_payment_processed(fx: &Fixture) -> SagaRecord {
        let saga = fx
            .orchestrator
            .start_purchase(fx.customer_id, fx.vehicle_id, PaymentType::Cash)
            .await
            .unwrap();
        let txn = saga.transaction_id;
        let now = Utc::now();

        fx.orchestrator
            .handle_event(&Event::CreditReserved(messages::CreditReservedData {
                transaction_id: txn,
                customer_id: fx.customer_id,
                amount: saga.amount,
                payment_type: PaymentType::Cash,
                remaining_balance: Some(Money::from_cents(1_500_000)),
                remaining_credit: None,
                timestamp: now,
            }))
            .await
            .unwrap();
        fx.orchestrator
            .handle_event(&Event::VehicleReserved(messages::VehicleReservedData {
                transaction_id: txn,
                vehicle_id: fx.vehicle_id,
                vehicle_price: saga.amount,
                timestamp: now,
            }))
            .await
            .unwrap();
        fx.orchestrator
            .handle_event(&Event::PaymentCodeGenerated(
                messages::PaymentCodeGeneratedData {
                    transaction_id: txn,
                    payment_code: "code-1".into(),
                    customer_id: fx.customer_id,
                    vehicle_id: fx.vehicle_id,
                    amount: saga.amount,
                    payment_type: PaymentType::Cash,
                    expires_at: now + chrono::Duration::minutes(30),
                    timestamp: now,
                },
            ))
            .await
            .unwrap();
        fx.orchestrator
            .handle_event(&Event::PaymentProcessed(messages::PaymentProcessedData {
                transaction_id: txn,
                payment_id: "PAY-1".into(),
                payment_code: "code-1".into(),
                customer_id: fx.customer_id,
                vehicle_id: fx.vehicle_id,
                amount: saga.amount,
                payment_type: PaymentType::Cash,
                payment_method: "pix".into(),
                status: "completed".into(),
                timestamp: now,
            }))
            .await
            .unwrap();

        fx.store.get(txn).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn start_purchase_persists_and_enqueues_reserve_credit() {
        let fx = fixture();
        let saga = fx
            .orchestrator
            .start_purchase(fx.customer_id, fx.vehicle_id, PaymentType::Cash)
            .await
            .unwrap();

        assert_eq!(saga.status, SagaStatus::InProgress);
        assert_eq!(saga.current_step, SagaStep::CreditReservation);
        assert_eq!(saga.amount, Money::from_cents(4_500_000));
        assert!(saga.context.customer_snapshot.is_some());
        assert!(saga.context.vehicle_snapshot.is_some());

        let pending = fx.store.fetch_unpublished(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].topic, "commands.credit.reserve");
    }

    #[tokio::test]
    async fn start_purchase_rejects_reserved_vehicle() {
        let fx = fixture();
        fx.vehicles
            .vehicle
            .write()
            .unwrap()
            .as_mut()
            .unwrap()
            .is_reserved = true;

        let err = fx
            .orchestrator
            .start_purchase(fx.customer_id, fx.vehicle_id, PaymentType::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::VehicleUnavailable(_)));
        assert_eq!(fx.store.fetch_unpublished(10).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn start_purchase_rejects_unknown_customer() {
        let fx = fixture();
        fx.customers.customer.write().unwrap().take();

        let err = fx
            .orchestrator
            .start_purchase(fx.customer_id, fx.vehicle_id, PaymentType::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::CustomerNotFound(_)));
    }

    #[tokio::test]
    async fn start_purchase_checks_the_right_funding_source() {
        let fx = fixture();
        // Enough cash, not enough credit.
        let err = fx
            .orchestrator
            .start_purchase(fx.customer_id, fx.vehicle_id, PaymentType::Credit)
            .await
            .unwrap_err();
        let OrchestratorError::InsufficientFunds { available, .. } = err else {
            panic!("expected InsufficientFunds");
        };
        assert_eq!(available, Money::from_cents(2_000_000));
    }

    #[tokio::test]
    async fn event_for_unknown_saga_is_ignored() {
        let fx = fixture();
        fx.orchestrator
            .handle_event(&Event::VehicleReleased(messages::VehicleReleasedData {
                transaction_id: TransactionId::new(),
                vehicle_id: fx.vehicle_id,
                timestamp: Utc::now(),
            }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn payment_processed_completes_through_mark_as_sold() {
        let fx = fixture();
        let saga = drive_to_payment_processed(&fx).await;
        assert_eq!(saga.status, SagaStatus::Completed);
        assert_eq!(saga.current_step, SagaStep::SagaComplete);
        assert_eq!(saga.context.payment_id.as_deref(), Some("PAY-1"));
    }

    #[tokio::test]
    async fn mark_as_sold_failure_requires_manual_intervention() {
        let fx = fixture();
        fx.vehicles.fail_mark_sold.store(true, Ordering::SeqCst);

        let saga = drive_to_payment_processed(&fx).await;
        assert_eq!(saga.status, SagaStatus::FailedRequiresManualIntervention);
        assert_eq!(saga.current_step, SagaStep::MarkVehicleAsSoldFailed);
        assert!(saga
            .context
            .error
            .as_deref()
            .unwrap()
            .contains("Failed to mark vehicle as sold"));
        // The payment is kept in context for the operator.
        assert_eq!(saga.context.payment_id.as_deref(), Some("PAY-1"));
    }
}
