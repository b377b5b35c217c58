//! Credit account entity and funding rules.

use common::{CustomerId, Money, PaymentType};
use serde::{Deserialize, Serialize};

/// A customer's funds as seen by the credit participant: a cash balance and
/// a credit line.
///
/// Invariants after every committed operation: `account_balance >= 0` and
/// `0 <= used_credit <= credit_limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    pub customer_id: CustomerId,
    pub account_balance: Money,
    pub credit_limit: Money,
    pub used_credit: Money,
}

/// Why a reservation was refused. The wire reasons in
/// `CreditReservationFailed` come from [`ReserveRejection::reason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveRejection {
    CustomerNotFound,
    InsufficientBalance,
    InsufficientCredit,
}

impl ReserveRejection {
    /// The reason string carried by the failure event.
    pub fn reason(&self) -> &'static str {
        match self {
            ReserveRejection::CustomerNotFound => "Customer not found",
            ReserveRejection::InsufficientBalance => "Insufficient account balance",
            ReserveRejection::InsufficientCredit => "Insufficient credit limit",
        }
    }
}

impl CreditAccount {
    /// Creates an account with the given cash balance and credit line.
    pub fn new(customer_id: CustomerId, account_balance: Money, credit_limit: Money) -> Self {
        Self {
            customer_id,
            account_balance,
            credit_limit,
            used_credit: Money::zero(),
        }
    }

    /// Credit still available on the line, floored at zero.
    pub fn available_credit(&self) -> Money {
        self.credit_limit.saturating_subtract(self.used_credit)
    }

    /// Reserves `amount` against the account.
    ///
    /// Cash debits the balance; credit grows `used_credit`. An amount exactly
    /// equal to the available funds succeeds.
    pub fn reserve(
        &mut self,
        amount: Money,
        payment_type: PaymentType,
    ) -> Result<(), ReserveRejection> {
        match payment_type {
            PaymentType::Cash => {
                if amount > self.account_balance {
                    return Err(ReserveRejection::InsufficientBalance);
                }
                self.account_balance = self.account_balance.subtract(amount);
            }
            PaymentType::Credit => {
                if amount > self.available_credit() {
                    return Err(ReserveRejection::InsufficientCredit);
                }
                self.used_credit = self.used_credit.add(amount);
            }
        }
        Ok(())
    }

    /// Reverses a reservation of `amount`.
    ///
    /// `used_credit` is floored at zero so a stray release can never push
    /// the line negative.
    pub fn release(&mut self, amount: Money, payment_type: PaymentType) {
        match payment_type {
            PaymentType::Cash => {
                self.account_balance = self.account_balance.add(amount);
            }
            PaymentType::Credit => {
                self.used_credit = self.used_credit.saturating_subtract(amount);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance: i64, limit: i64) -> CreditAccount {
        CreditAccount::new(
            CustomerId::new(),
            Money::from_cents(balance),
            Money::from_cents(limit),
        )
    }

    #[test]
    fn cash_reserve_debits_balance() {
        let mut acc = account(6_000_000, 0);
        acc.reserve(Money::from_cents(4_500_000), PaymentType::Cash)
            .unwrap();
        assert_eq!(acc.account_balance, Money::from_cents(1_500_000));
    }

    #[test]
    fn cash_reserve_at_exact_balance_succeeds() {
        let mut acc = account(4_500_000, 0);
        acc.reserve(Money::from_cents(4_500_000), PaymentType::Cash)
            .unwrap();
        assert_eq!(acc.account_balance, Money::zero());
    }

    #[test]
    fn cash_reserve_one_cent_over_fails() {
        let mut acc = account(4_500_000, 0);
        let err = acc
            .reserve(Money::from_cents(4_500_001), PaymentType::Cash)
            .unwrap_err();
        assert_eq!(err, ReserveRejection::InsufficientBalance);
        assert_eq!(acc.account_balance, Money::from_cents(4_500_000));
    }

    #[test]
    fn credit_reserve_grows_used_credit() {
        let mut acc = account(500_000, 6_000_000);
        acc.reserve(Money::from_cents(5_000_000), PaymentType::Credit)
            .unwrap();
        assert_eq!(acc.used_credit, Money::from_cents(5_000_000));
        assert_eq!(acc.available_credit(), Money::from_cents(1_000_000));
        // Cash balance untouched on the credit path.
        assert_eq!(acc.account_balance, Money::from_cents(500_000));
    }

    #[test]
    fn credit_reserve_at_exact_available_succeeds() {
        let mut acc = account(0, 1_000_000);
        acc.reserve(Money::from_cents(1_000_000), PaymentType::Credit)
            .unwrap();
        assert_eq!(acc.available_credit(), Money::zero());
    }

    #[test]
    fn credit_reserve_one_cent_over_fails() {
        let mut acc = account(0, 1_000_000);
        let err = acc
            .reserve(Money::from_cents(1_000_001), PaymentType::Credit)
            .unwrap_err();
        assert_eq!(err, ReserveRejection::InsufficientCredit);
        assert_eq!(acc.used_credit, Money::zero());
    }

    #[test]
    fn release_reverses_reserve() {
        let mut acc = account(4_500_000, 2_000_000);
        acc.reserve(Money::from_cents(4_500_000), PaymentType::Cash)
            .unwrap();
        acc.release(Money::from_cents(4_500_000), PaymentType::Cash);
        assert_eq!(acc.account_balance, Money::from_cents(4_500_000));

        acc.reserve(Money::from_cents(2_000_000), PaymentType::Credit)
            .unwrap();
        acc.release(Money::from_cents(2_000_000), PaymentType::Credit);
        assert_eq!(acc.used_credit, Money::zero());
    }

    #[test]
    fn credit_release_floors_at_zero() {
        let mut acc = account(0, 1_000_000);
        acc.release(Money::from_cents(300_000), PaymentType::Credit);
        assert_eq!(acc.used_credit, Money::zero());
        assert_eq!(acc.available_credit(), Money::from_cents(1_000_000));
    }
}
