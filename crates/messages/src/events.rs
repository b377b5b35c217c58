//! Events published by participants (and the orchestrator) on `events.*` topics.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, PaymentType, TransactionId, VehicleId};
use serde::{Deserialize, Serialize};

use crate::topics;

/// A declarative announcement that a local transaction occurred, successfully
/// or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    CreditReserved(CreditReservedData),
    CreditReservationFailed(CreditReservationFailedData),
    CreditReleased(CreditReleasedData),
    VehicleReserved(VehicleReservedData),
    VehicleReservationFailed(VehicleReservationFailedData),
    VehicleReleased(VehicleReleasedData),
    PaymentCodeGenerated(PaymentCodeGeneratedData),
    PaymentCodeGenerationFailed(PaymentCodeGenerationFailedData),
    PaymentProcessed(PaymentProcessedData),
    PaymentFailed(PaymentFailedData),
    PaymentRefunded(PaymentRefundedData),
    PaymentRefundFailed(PaymentRefundFailedData),
    PurchaseCancelled(PurchaseCancelledData),
    PurchaseCancellationFailed(PurchaseCancellationFailedData),
}

/// Data for CreditReserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditReservedData {
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub payment_type: PaymentType,
    /// Cash balance after the debit (cash path only).
    pub remaining_balance: Option<Money>,
    /// Available credit after the reservation (credit path only).
    pub remaining_credit: Option<Money>,
    pub timestamp: DateTime<Utc>,
}

/// Data for CreditReservationFailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditReservationFailedData {
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Data for CreditReleased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditReleasedData {
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub new_balance: Option<Money>,
    pub new_available_credit: Option<Money>,
    pub timestamp: DateTime<Utc>,
}

/// Data for VehicleReserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleReservedData {
    pub transaction_id: TransactionId,
    pub vehicle_id: VehicleId,
    /// Price at reservation time, for cross-checking the frozen saga amount.
    pub vehicle_price: Money,
    pub timestamp: DateTime<Utc>,
}

/// Data for VehicleReservationFailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleReservationFailedData {
    pub transaction_id: TransactionId,
    pub vehicle_id: VehicleId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Data for VehicleReleased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleReleasedData {
    pub transaction_id: TransactionId,
    pub vehicle_id: VehicleId,
    pub timestamp: DateTime<Utc>,
}

/// Data for PaymentCodeGenerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCodeGeneratedData {
    pub transaction_id: TransactionId,
    pub payment_code: String,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub expires_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

/// Data for PaymentCodeGenerationFailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCodeGenerationFailedData {
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Data for PaymentProcessed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentProcessedData {
    pub transaction_id: TransactionId,
    pub payment_id: String,
    pub payment_code: String,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub payment_method: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Data for PaymentFailed.
///
/// The code-bound fields are unknown when the failure is "code not found",
/// so they are optional and null on the wire in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub transaction_id: TransactionId,
    pub payment_code: String,
    pub customer_id: Option<CustomerId>,
    pub vehicle_id: Option<VehicleId>,
    pub amount: Option<Money>,
    pub payment_type: Option<PaymentType>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Data for PaymentRefunded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundedData {
    pub transaction_id: TransactionId,
    pub payment_id: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Data for PaymentRefundFailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundFailedData {
    pub transaction_id: TransactionId,
    pub payment_id: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Data for PurchaseCancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseCancelledData {
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    /// The forward step the saga was at when cancellation was requested.
    pub cancelled_step: String,
    pub reason: String,
    pub compensation_completed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Data for PurchaseCancellationFailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseCancellationFailedData {
    pub transaction_id: TransactionId,
    pub reason: String,
    pub current_step: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Returns the event type name as it appears on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::CreditReserved(_) => "CreditReserved",
            Event::CreditReservationFailed(_) => "CreditReservationFailed",
            Event::CreditReleased(_) => "CreditReleased",
            Event::VehicleReserved(_) => "VehicleReserved",
            Event::VehicleReservationFailed(_) => "VehicleReservationFailed",
            Event::VehicleReleased(_) => "VehicleReleased",
            Event::PaymentCodeGenerated(_) => "PaymentCodeGenerated",
            Event::PaymentCodeGenerationFailed(_) => "PaymentCodeGenerationFailed",
            Event::PaymentProcessed(_) => "PaymentProcessed",
            Event::PaymentFailed(_) => "PaymentFailed",
            Event::PaymentRefunded(_) => "PaymentRefunded",
            Event::PaymentRefundFailed(_) => "PaymentRefundFailed",
            Event::PurchaseCancelled(_) => "PurchaseCancelled",
            Event::PurchaseCancellationFailed(_) => "PurchaseCancellationFailed",
        }
    }

    /// Returns the saga this event belongs to.
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            Event::CreditReserved(d) => d.transaction_id,
            Event::CreditReservationFailed(d) => d.transaction_id,
            Event::CreditReleased(d) => d.transaction_id,
            Event::VehicleReserved(d) => d.transaction_id,
            Event::VehicleReservationFailed(d) => d.transaction_id,
            Event::VehicleReleased(d) => d.transaction_id,
            Event::PaymentCodeGenerated(d) => d.transaction_id,
            Event::PaymentCodeGenerationFailed(d) => d.transaction_id,
            Event::PaymentProcessed(d) => d.transaction_id,
            Event::PaymentFailed(d) => d.transaction_id,
            Event::PaymentRefunded(d) => d.transaction_id,
            Event::PaymentRefundFailed(d) => d.transaction_id,
            Event::PurchaseCancelled(d) => d.transaction_id,
            Event::PurchaseCancellationFailed(d) => d.transaction_id,
        }
    }

    /// Returns the short topic name this event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            Event::CreditReserved(_) => topics::EVT_CREDIT_RESERVED,
            Event::CreditReservationFailed(_) => topics::EVT_CREDIT_RESERVATION_FAILED,
            Event::CreditReleased(_) => topics::EVT_CREDIT_RELEASED,
            Event::VehicleReserved(_) => topics::EVT_VEHICLE_RESERVED,
            Event::VehicleReservationFailed(_) => topics::EVT_VEHICLE_RESERVATION_FAILED,
            Event::VehicleReleased(_) => topics::EVT_VEHICLE_RELEASED,
            Event::PaymentCodeGenerated(_) => topics::EVT_PAYMENT_CODE_GENERATED,
            Event::PaymentCodeGenerationFailed(_) => topics::EVT_PAYMENT_CODE_GENERATION_FAILED,
            Event::PaymentProcessed(_) => topics::EVT_PAYMENT_PROCESSED,
            Event::PaymentFailed(_) => topics::EVT_PAYMENT_FAILED,
            Event::PaymentRefunded(_) => topics::EVT_PAYMENT_REFUNDED,
            Event::PaymentRefundFailed(_) => topics::EVT_PAYMENT_REFUND_FAILED,
            Event::PurchaseCancelled(_) => topics::EVT_PURCHASE_CANCELLED,
            Event::PurchaseCancellationFailed(_) => topics::EVT_PURCHASE_CANCELLATION_FAILED,
        }
    }
}
