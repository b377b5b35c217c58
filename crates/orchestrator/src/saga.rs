//! The orchestrator's authoritative saga record.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, PaymentType, TransactionId, VehicleId};
use serde::{Deserialize, Serialize};

use crate::status::SagaStatus;
use crate::step::SagaStep;

/// Diagnostic snapshot of the customer at saga start, cached in context.
/// Never authoritative: the credit participant owns the live account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub customer_id: CustomerId,
    pub account_balance: Money,
    pub credit_limit: Money,
    pub available_credit: Money,
}

/// Diagnostic snapshot of the vehicle at saga start, cached in context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub vehicle_id: VehicleId,
    pub model: String,
    pub price: Money,
    pub is_reserved: bool,
    pub is_sold: bool,
}

/// Structured key/value bag persisted with the saga row.
///
/// Holds error reasons, the generated payment code, the payment id once
/// created, the step the saga was at when cancellation began, and the cached
/// participant snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compensation_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_requested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_from_step: Option<SagaStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_snapshot: Option<CustomerSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_snapshot: Option<VehicleSnapshot>,
}

/// The persistent state of one purchase saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaRecord {
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    /// Frozen at saga start from the vehicle's price at that instant.
    pub amount: Money,
    pub payment_type: PaymentType,
    pub status: SagaStatus,
    pub current_step: SagaStep,
    pub context: SagaContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaRecord {
    /// Creates the initial record for a purchase, positioned at the first
    /// forward step.
    pub fn new(
        transaction_id: TransactionId,
        customer_id: CustomerId,
        vehicle_id: VehicleId,
        amount: Money,
        payment_type: PaymentType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            customer_id,
            vehicle_id,
            amount,
            payment_type,
            status: SagaStatus::Started,
            current_step: SagaStep::CreditReservation,
            context: SagaContext::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SagaRecord {
        SagaRecord::new(
            TransactionId::new(),
            CustomerId::new(),
            VehicleId::new(),
            Money::from_cents(4_500_000),
            PaymentType::Cash,
            Utc::now(),
        )
    }

    #[test]
    fn new_record_is_at_the_first_step() {
        let saga = record();
        assert_eq!(saga.status, SagaStatus::Started);
        assert_eq!(saga.current_step, SagaStep::CreditReservation);
        assert!(saga.amount.is_positive());
    }

    #[test]
    fn context_omits_empty_fields_on_the_wire() {
        let saga = record();
        let value = serde_json::to_value(&saga.context).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn serialization_roundtrip() {
        let mut saga = record();
        saga.context.error = Some("Insufficient credit limit".into());
        saga.context.payment_code = Some("abc123".into());
        saga.context.cancelled_from_step = Some(SagaStep::PaymentProcessing);

        let json = serde_json::to_string(&saga).unwrap();
        let back: SagaRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.transaction_id, saga.transaction_id);
        assert_eq!(back.status, saga.status);
        assert_eq!(back.context.error.as_deref(), Some("Insufficient credit limit"));
        assert_eq!(
            back.context.cancelled_from_step,
            Some(SagaStep::PaymentProcessing)
        );
    }
}
