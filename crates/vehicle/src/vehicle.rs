//! Vehicle entity.

use common::{Money, TransactionId, VehicleId};
use serde::{Deserialize, Serialize};

/// An inventory item.
///
/// `is_sold` is terminal. While a vehicle is reserved or sold, mutating
/// writes from the CRUD surface are refused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: VehicleId,
    pub model: String,
    pub license_plate: String,
    pub price: Money,
    pub is_reserved: bool,
    pub is_sold: bool,
    /// The saga holding the current reservation, used to keep reserve and
    /// release idempotent per transaction.
    pub reserved_by: Option<TransactionId>,
}

impl Vehicle {
    /// Creates an available vehicle.
    pub fn new(
        vehicle_id: VehicleId,
        model: impl Into<String>,
        license_plate: impl Into<String>,
        price: Money,
    ) -> Self {
        Self {
            vehicle_id,
            model: model.into(),
            license_plate: license_plate.into(),
            price,
            is_reserved: false,
            is_sold: false,
            reserved_by: None,
        }
    }

    /// True if the vehicle can be offered for purchase.
    pub fn is_available(&self) -> bool {
        !self.is_reserved && !self.is_sold
    }

    /// Reserves the vehicle for a transaction.
    ///
    /// A redelivered reserve from the same transaction observes its own
    /// reservation and succeeds; any other transaction is refused.
    pub fn reserve(&mut self, transaction_id: TransactionId) -> bool {
        if self.is_sold {
            return false;
        }
        if self.is_reserved {
            return self.reserved_by == Some(transaction_id);
        }
        self.is_reserved = true;
        self.reserved_by = Some(transaction_id);
        true
    }

    /// Clears the reservation if this transaction holds it.
    pub fn release(&mut self, transaction_id: TransactionId) {
        if self.is_sold || !self.is_reserved {
            return;
        }
        if self.reserved_by.is_none() || self.reserved_by == Some(transaction_id) {
            self.is_reserved = false;
            self.reserved_by = None;
        }
    }

    /// Marks the vehicle sold. Terminal; also clears the reservation.
    pub fn mark_sold(&mut self) {
        self.is_sold = true;
        self.is_reserved = false;
        self.reserved_by = None;
    }

    /// Rejects CRUD mutation of a reserved or sold vehicle.
    pub fn ensure_editable(&self) -> Result<(), crate::error::VehicleError> {
        if self.is_reserved || self.is_sold {
            return Err(crate::error::VehicleError::NotEditable(self.vehicle_id));
        }
        Ok(())
    }
}
