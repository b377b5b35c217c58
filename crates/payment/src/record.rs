//! Payment record entity.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, PaymentType, TransactionId, VehicleId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal state of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A settled (or refused) payment, back-referencing the saga and the code it
/// was paid against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub transaction_id: TransactionId,
    pub payment_code: String,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub processed_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Creates a record with a fresh payment id.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: TransactionId,
        payment_code: impl Into<String>,
        customer_id: CustomerId,
        vehicle_id: VehicleId,
        amount: Money,
        payment_type: PaymentType,
        payment_method: impl Into<String>,
        status: PaymentStatus,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            payment_id: format!("PAY-{}", Uuid::new_v4().simple()),
            transaction_id,
            payment_code: payment_code.into(),
            customer_id,
            vehicle_id,
            amount,
            payment_type,
            payment_method: payment_method.into(),
            status,
            processed_at,
        }
    }
}
