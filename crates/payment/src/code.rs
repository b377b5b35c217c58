//! Payment code entity.

use chrono::{DateTime, Duration, Utc};
use common::{CustomerId, Money, PaymentType, TransactionId, VehicleId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a freshly minted code stays payable.
pub const CODE_TTL: Duration = Duration::minutes(30);

/// Lifecycle of a payment code: minted `Pending`, becomes `Used` exactly
/// once when a payment succeeds, otherwise decays to `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentCodeStatus {
    Pending,
    Used,
    Expired,
}

impl PaymentCodeStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentCodeStatus::Pending => "pending",
            PaymentCodeStatus::Used => "used",
            PaymentCodeStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for PaymentCodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An opaque code binding a transaction to the amount the customer must pay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCode {
    pub code: String,
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub status: PaymentCodeStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PaymentCode {
    /// Mints a new pending code expiring [`CODE_TTL`] from `now`.
    pub fn mint(
        transaction_id: TransactionId,
        customer_id: CustomerId,
        vehicle_id: VehicleId,
        amount: Money,
        payment_type: PaymentType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            code: Uuid::new_v4().simple().to_string(),
            transaction_id,
            customer_id,
            vehicle_id,
            amount,
            payment_type,
            status: PaymentCodeStatus::Pending,
            expires_at: now + CODE_TTL,
            created_at: now,
        }
    }

    /// A code at or past its expiry instant is expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint(now: DateTime<Utc>) -> PaymentCode {
        PaymentCode::mint(
            TransactionId::new(),
            CustomerId::new(),
            VehicleId::new(),
            Money::from_cents(4_500_000),
            PaymentType::Cash,
            now,
        )
    }

    #[test]
    fn minted_codes_are_pending_and_unique() {
        let now = Utc::now();
        let a = mint(now);
        let b = mint(now);
        assert_eq!(a.status, PaymentCodeStatus::Pending);
        assert_ne!(a.code, b.code);
        assert_eq!(a.expires_at, now + CODE_TTL);
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let code = mint(now);
        assert!(!code.is_expired(code.expires_at - Duration::seconds(1)));
        // now == expires_at counts as expired.
        assert!(code.is_expired(code.expires_at));
        assert!(code.is_expired(code.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(PaymentCodeStatus::Pending.to_string(), "pending");
        assert_eq!(PaymentCodeStatus::Used.to_string(), "used");
        assert_eq!(PaymentCodeStatus::Expired.to_string(), "expired");
    }
}
