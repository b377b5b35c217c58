//! Pure saga transition core.
//!
//! Every decision the orchestrator makes lives here as a function from
//! `(SagaRecord, input)` to a new record plus a list of [`Directive`]s for
//! the I/O shell to carry out. Nothing in this module touches the store, the
//! bus, or the clock (the caller passes `now`), so the whole state machine
//! is testable without infrastructure.
//!
//! Release events are polysemous: `VehicleReleased` and `CreditReleased`
//! mean different things depending on whether the saga is compensating or
//! cancelling, so every arm branches on the observed status and step rather
//! than on arrival order. Events that do not match the saga's position are
//! ignored — that is what makes redelivery harmless.

use chrono::{DateTime, Utc};
use common::VehicleId;
use messages::{
    Command, Event, GeneratePaymentCodeData, ProcessPaymentData, PurchaseCancellationFailedData,
    PurchaseCancelledData, RefundPaymentData, ReleaseCreditData, ReleaseVehicleData,
    ReserveVehicleData,
};

use crate::saga::SagaRecord;
use crate::status::SagaStatus;
use crate::step::{CancellationRoute, SagaStep};

/// Payment method the orchestrator settles purchases with.
pub const PAYMENT_METHOD: &str = "pix";

/// An effect the shell must perform after persisting the new record.
#[derive(Debug, Clone)]
pub enum Directive {
    /// Publish a command on its command topic (via the outbox).
    Publish(Command),
    /// Publish an orchestrator-owned event on its event topic (via the
    /// outbox).
    Emit(Event),
    /// Synchronously mark the vehicle sold at the vehicle participant's
    /// HTTP boundary, then feed the result back through
    /// [`on_vehicle_sold`] / [`on_vehicle_sold_failed`].
    MarkVehicleSold { vehicle_id: VehicleId },
}

/// A new saga record plus the effects it requires.
#[derive(Debug, Clone)]
pub struct Transition {
    pub saga: SagaRecord,
    pub directives: Vec<Directive>,
}

/// Decision for an external cancellation request.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    /// The request was accepted; the record is now `CANCELLATION_REQUESTED`
    /// and [`dispatch_cancellation`] must run next.
    Accepted(Transition),
    /// The purchase is too far along; the record moves to
    /// `CANCELLATION_FAILED` and a `PurchaseCancellationFailed` event is
    /// emitted. The caller answers with a 400-class response.
    Rejected(Transition),
    /// The saga is in a terminal (or compensating) status that a
    /// cancellation cannot touch. No state change.
    NotCancellable(SagaStatus),
    /// A cancellation is already in progress. No state change.
    AlreadyCancelling,
}

fn base(saga: &SagaRecord, now: DateTime<Utc>) -> SagaRecord {
    let mut next = saga.clone();
    next.updated_at = now;
    next
}

/// Applies a participant event to the saga.
///
/// Returns `None` when the event does not concern the saga's current
/// position (late duplicate, redelivery after a terminal state); the caller
/// acks and moves on.
pub fn on_event(saga: &SagaRecord, event: &Event, now: DateTime<Utc>) -> Option<Transition> {
    match event {
        Event::CreditReserved(_) => {
            if !matches!(saga.status, SagaStatus::Started | SagaStatus::InProgress)
                || saga.current_step != SagaStep::CreditReservation
            {
                return None;
            }
            let mut next = base(saga, now);
            next.status = SagaStatus::InProgress;
            next.current_step = SagaStep::VehicleReservation;
            Some(Transition {
                directives: vec![Directive::Publish(Command::ReserveVehicle(
                    ReserveVehicleData {
                        transaction_id: next.transaction_id,
                        vehicle_id: next.vehicle_id,
                    },
                ))],
                saga: next,
            })
        }

        Event::CreditReservationFailed(data) => {
            if !matches!(saga.status, SagaStatus::Started | SagaStatus::InProgress)
                || saga.current_step != SagaStep::CreditReservation
            {
                return None;
            }
            // Nothing has been taken yet, so there is nothing to compensate.
            let mut next = base(saga, now);
            next.status = SagaStatus::Failed;
            next.current_step = SagaStep::CreditReservationFailed;
            next.context.error = Some(data.reason.clone());
            Some(Transition {
                saga: next,
                directives: vec![],
            })
        }

        Event::VehicleReserved(_) => {
            if saga.status != SagaStatus::InProgress
                || saga.current_step != SagaStep::VehicleReservation
            {
                return None;
            }
            let mut next = base(saga, now);
            next.current_step = SagaStep::PaymentCodeGeneration;
            Some(Transition {
                directives: vec![Directive::Publish(Command::GeneratePaymentCode(
                    GeneratePaymentCodeData {
                        transaction_id: next.transaction_id,
                        customer_id: next.customer_id,
                        vehicle_id: next.vehicle_id,
                        amount: next.amount,
                        payment_type: next.payment_type,
                    },
                ))],
                saga: next,
            })
        }

        Event::VehicleReservationFailed(data) => {
            if saga.status != SagaStatus::InProgress
                || saga.current_step != SagaStep::VehicleReservation
            {
                return None;
            }
            // Credit is the only thing held; release it.
            let mut next = base(saga, now);
            next.status = SagaStatus::Compensating;
            next.current_step = SagaStep::CreditRelease;
            next.context.error = Some(data.reason.clone());
            Some(Transition {
                directives: vec![release_credit(&next)],
                saga: next,
            })
        }

        Event::PaymentCodeGenerated(data) => {
            if saga.status != SagaStatus::InProgress
                || saga.current_step != SagaStep::PaymentCodeGeneration
            {
                return None;
            }
            let mut next = base(saga, now);
            next.current_step = SagaStep::PaymentProcessing;
            next.context.payment_code = Some(data.payment_code.clone());
            Some(Transition {
                directives: vec![Directive::Publish(Command::ProcessPayment(
                    ProcessPaymentData {
                        transaction_id: next.transaction_id,
                        payment_code: data.payment_code.clone(),
                        payment_method: PAYMENT_METHOD.to_string(),
                    },
                ))],
                saga: next,
            })
        }

        Event::PaymentCodeGenerationFailed(data) => {
            if saga.status != SagaStatus::InProgress
                || saga.current_step != SagaStep::PaymentCodeGeneration
            {
                return None;
            }
            Some(start_compensation(saga, &data.reason, now))
        }

        Event::PaymentFailed(data) => {
            if saga.status != SagaStatus::InProgress
                || saga.current_step != SagaStep::PaymentProcessing
            {
                return None;
            }
            Some(start_compensation(saga, &data.reason, now))
        }

        Event::PaymentProcessed(data) => match saga.status {
            SagaStatus::InProgress if saga.current_step == SagaStep::PaymentProcessing => {
                let mut next = base(saga, now);
                next.current_step = SagaStep::MarkVehicleAsSold;
                next.context.payment_id = Some(data.payment_id.clone());
                Some(Transition {
                    directives: vec![Directive::MarkVehicleSold {
                        vehicle_id: next.vehicle_id,
                    }],
                    saga: next,
                })
            }
            // A payment that lands after cancellation started is accepted
            // into context and immediately sent back for refund; the
            // cancellation sub-machine keeps driving the saga.
            SagaStatus::CancellationRequested
            | SagaStatus::Cancelling
            | SagaStatus::Cancelled => {
                if saga.context.payment_id.is_some() {
                    return None;
                }
                let mut next = base(saga, now);
                next.context.payment_id = Some(data.payment_id.clone());
                Some(Transition {
                    directives: vec![Directive::Publish(Command::RefundPayment(
                        RefundPaymentData {
                            transaction_id: next.transaction_id,
                            payment_id: data.payment_id.clone(),
                        },
                    ))],
                    saga: next,
                })
            }
            _ => None,
        },

        Event::VehicleReleased(_) => match (saga.status, saga.current_step) {
            (SagaStatus::Compensating, SagaStep::VehicleRelease) => {
                let mut next = base(saga, now);
                next.current_step = SagaStep::CreditRelease;
                Some(Transition {
                    directives: vec![release_credit(&next)],
                    saga: next,
                })
            }
            (SagaStatus::Cancelling, SagaStep::CancellationVehicleRelease) => {
                let mut next = base(saga, now);
                next.current_step = SagaStep::CancellationCreditRelease;
                Some(Transition {
                    directives: vec![release_credit(&next)],
                    saga: next,
                })
            }
            _ => None,
        },

        Event::CreditReleased(_) => match (saga.status, saga.current_step) {
            (SagaStatus::Compensating, SagaStep::CreditRelease) => {
                let mut next = base(saga, now);
                next.status = SagaStatus::FailedCompensated;
                next.current_step = SagaStep::CompensationComplete;
                Some(Transition {
                    saga: next,
                    directives: vec![],
                })
            }
            (SagaStatus::Cancelling, SagaStep::CancellationCreditRelease) => {
                let mut next = base(saga, now);
                next.status = SagaStatus::Cancelled;
                next.current_step = SagaStep::CancellationComplete;
                let cancelled_step = next
                    .context
                    .cancelled_from_step
                    .unwrap_or(saga.current_step);
                let event = Event::PurchaseCancelled(PurchaseCancelledData {
                    transaction_id: next.transaction_id,
                    customer_id: next.customer_id,
                    vehicle_id: next.vehicle_id,
                    cancelled_step: cancelled_step.to_string(),
                    reason: next.context.cancellation_reason.clone().unwrap_or_default(),
                    compensation_completed: true,
                    timestamp: now,
                });
                Some(Transition {
                    directives: vec![Directive::Emit(event)],
                    saga: next,
                })
            }
            _ => None,
        },

        Event::PaymentRefunded(data) => match (saga.status, saga.current_step) {
            (SagaStatus::Compensating, SagaStep::PaymentRefund) => {
                let mut next = base(saga, now);
                next.status = SagaStatus::FailedCompensated;
                next.current_step = SagaStep::CompensationComplete;
                next.context.refunded_payment_id = Some(data.payment_id.clone());
                Some(Transition {
                    saga: next,
                    directives: vec![],
                })
            }
            (
                SagaStatus::CancellationRequested | SagaStatus::Cancelling | SagaStatus::Cancelled,
                _,
            ) => {
                if saga.context.refunded_payment_id.is_some() {
                    return None;
                }
                let mut next = base(saga, now);
                next.context.refunded_payment_id = Some(data.payment_id.clone());
                Some(Transition {
                    saga: next,
                    directives: vec![],
                })
            }
            _ => None,
        },

        Event::PaymentRefundFailed(data) => {
            // Losing a refund means money is stuck: whatever phase the saga
            // is in, an operator has to take over.
            if !matches!(
                saga.status,
                SagaStatus::Compensating
                    | SagaStatus::CancellationRequested
                    | SagaStatus::Cancelling
                    | SagaStatus::Cancelled
            ) {
                return None;
            }
            let mut next = base(saga, now);
            next.status = SagaStatus::FailedRequiresManualIntervention;
            next.current_step = SagaStep::PaymentRefundFailed;
            next.context.compensation_error = Some(data.reason.clone());
            Some(Transition {
                saga: next,
                directives: vec![],
            })
        }

        // Orchestrator-owned events; it does not consume its own
        // announcements.
        Event::PurchaseCancelled(_) | Event::PurchaseCancellationFailed(_) => None,
    }
}

/// Evaluates an external cancellation request.
pub fn request_cancellation(saga: &SagaRecord, reason: &str, now: DateTime<Utc>) -> CancelOutcome {
    if saga.status.is_cancelling() {
        return CancelOutcome::AlreadyCancelling;
    }

    // A completed purchase, or one at an irreversible step, cannot be
    // unwound; record the refusal so operators can see it was attempted.
    let too_advanced = matches!(
        saga.status,
        SagaStatus::InProgress | SagaStatus::Completed | SagaStatus::CancellationFailed
    ) && saga.current_step.cancellation_route() == CancellationRoute::TooAdvanced;
    if too_advanced {
        let refusal = if saga.current_step == SagaStep::SagaComplete {
            "Transaction already completed"
        } else {
            "Transaction too advanced to cancel"
        };
        let mut next = base(saga, now);
        next.status = SagaStatus::CancellationFailed;
        next.context.cancellation_reason = Some(refusal.to_string());
        let event = Event::PurchaseCancellationFailed(PurchaseCancellationFailedData {
            transaction_id: next.transaction_id,
            reason: refusal.to_string(),
            current_step: saga.current_step.to_string(),
            timestamp: now,
        });
        return CancelOutcome::Rejected(Transition {
            directives: vec![Directive::Emit(event)],
            saga: next,
        });
    }

    if saga.status.is_terminal() || saga.status == SagaStatus::Compensating {
        return CancelOutcome::NotCancellable(saga.status);
    }

    let mut next = base(saga, now);
    next.status = SagaStatus::CancellationRequested;
    next.context.cancellation_reason = Some(reason.to_string());
    next.context.cancellation_requested_at = Some(now);
    next.context.cancelled_from_step = Some(saga.current_step);
    CancelOutcome::Accepted(Transition {
        saga: next,
        directives: vec![],
    })
}

/// Enters the cancellation sub-machine from `CANCELLATION_REQUESTED`,
/// issuing the first reverse command based on the step the saga was at.
pub fn dispatch_cancellation(saga: &SagaRecord, now: DateTime<Utc>) -> Option<Transition> {
    if saga.status != SagaStatus::CancellationRequested {
        return None;
    }
    let from_step = saga.context.cancelled_from_step.unwrap_or(saga.current_step);
    let mut next = base(saga, now);
    next.status = SagaStatus::Cancelling;
    match from_step.cancellation_route() {
        CancellationRoute::ReleaseCredit => {
            next.current_step = SagaStep::CancellationCreditRelease;
            Some(Transition {
                directives: vec![release_credit(&next)],
                saga: next,
            })
        }
        CancellationRoute::ReleaseVehicle => {
            next.current_step = SagaStep::CancellationVehicleRelease;
            Some(Transition {
                directives: vec![Directive::Publish(Command::ReleaseVehicle(
                    ReleaseVehicleData {
                        transaction_id: next.transaction_id,
                        vehicle_id: next.vehicle_id,
                    },
                ))],
                saga: next,
            })
        }
        // request_cancellation never accepts an unroutable step.
        CancellationRoute::TooAdvanced => None,
    }
}

/// Applies the successful outcome of the synchronous mark-as-sold call.
pub fn on_vehicle_sold(saga: &SagaRecord, now: DateTime<Utc>) -> Option<Transition> {
    if !matches!(
        saga.status,
        SagaStatus::InProgress | SagaStatus::CancellationFailed
    ) || saga.current_step != SagaStep::MarkVehicleAsSold
    {
        return None;
    }
    let mut next = base(saga, now);
    next.status = SagaStatus::Completed;
    next.current_step = SagaStep::SagaComplete;
    Some(Transition {
        saga: next,
        directives: vec![],
    })
}

/// Applies a failed mark-as-sold call: payment is committed but the vehicle
/// record is wrong, which no automatic path can fix.
pub fn on_vehicle_sold_failed(
    saga: &SagaRecord,
    error: &str,
    now: DateTime<Utc>,
) -> Option<Transition> {
    if !matches!(
        saga.status,
        SagaStatus::InProgress | SagaStatus::CancellationFailed
    ) || saga.current_step != SagaStep::MarkVehicleAsSold
    {
        return None;
    }
    let mut next = base(saga, now);
    next.status = SagaStatus::FailedRequiresManualIntervention;
    next.current_step = SagaStep::MarkVehicleAsSoldFailed;
    next.context.error = Some(format!("Failed to mark vehicle as sold: {error}"));
    Some(Transition {
        saga: next,
        directives: vec![],
    })
}

fn release_credit(saga: &SagaRecord) -> Directive {
    Directive::Publish(Command::ReleaseCredit(ReleaseCreditData {
        transaction_id: saga.transaction_id,
        customer_id: saga.customer_id,
        amount: saga.amount,
        payment_type: saga.payment_type,
    }))
}

fn start_compensation(saga: &SagaRecord, reason: &str, now: DateTime<Utc>) -> Transition {
    let mut next = base(saga, now);
    next.status = SagaStatus::Compensating;
    next.current_step = SagaStep::VehicleRelease;
    next.context.error = Some(reason.to_string());
    Transition {
        directives: vec![Directive::Publish(Command::ReleaseVehicle(
            ReleaseVehicleData {
                transaction_id: next.transaction_id,
                vehicle_id: next.vehicle_id,
            },
        ))],
        saga: next,
    }
}
