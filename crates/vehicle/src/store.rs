//! Vehicle store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{TransactionId, VehicleId};

use crate::error::{Result, VehicleError};
use crate::vehicle::Vehicle;

/// Outcome of a reserve operation.
#[derive(Debug, Clone)]
pub enum ReserveVehicleOutcome {
    /// The vehicle is now (or was already, for this transaction) reserved.
    Reserved(Vehicle),
    /// The vehicle does not exist.
    NotFound,
    /// The vehicle is reserved by another transaction, or sold.
    Unavailable,
}

/// Persistence seam for vehicles.
#[async_trait]
pub trait VehicleStore: Send + Sync {
    /// Inserts a new vehicle.
    async fn insert(&self, vehicle: Vehicle) -> Result<()>;

    /// Fetches a vehicle by id.
    async fn get(&self, vehicle_id: VehicleId) -> Result<Option<Vehicle>>;

    /// Atomically reserves a vehicle for a transaction.
    async fn reserve(
        &self,
        transaction_id: TransactionId,
        vehicle_id: VehicleId,
    ) -> Result<ReserveVehicleOutcome>;

    /// Atomically clears a reservation held by the transaction. Returns the
    /// vehicle when it exists; a missing vehicle is not an error because the
    /// release event is emitted regardless.
    async fn release(
        &self,
        transaction_id: TransactionId,
        vehicle_id: VehicleId,
    ) -> Result<Option<Vehicle>>;

    /// Marks a vehicle sold (terminal). Fails only when the vehicle is
    /// missing.
    async fn mark_sold(&self, vehicle_id: VehicleId) -> Result<Vehicle>;
}

#[derive(Debug, Default)]
struct InMemoryVehicleState {
    vehicles: HashMap<VehicleId, Vehicle>,
}

/// In-memory vehicle store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVehicleStore {
    state: Arc<RwLock<InMemoryVehicleState>>,
}

impl InMemoryVehicleStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VehicleStore for InMemoryVehicleStore {
    async fn insert(&self, vehicle: Vehicle) -> Result<()> {
        let mut state = lock_write(&self.state)?;
        state.vehicles.insert(vehicle.vehicle_id, vehicle);
        Ok(())
    }

    async fn get(&self, vehicle_id: VehicleId) -> Result<Option<Vehicle>> {
        let state = lock_read(&self.state)?;
        Ok(state.vehicles.get(&vehicle_id).cloned())
    }

    async fn reserve(
        &self,
        transaction_id: TransactionId,
        vehicle_id: VehicleId,
    ) -> Result<ReserveVehicleOutcome> {
        let mut state = lock_write(&self.state)?;
        let Some(vehicle) = state.vehicles.get_mut(&vehicle_id) else {
            return Ok(ReserveVehicleOutcome::NotFound);
        };
        if vehicle.reserve(transaction_id) {
            Ok(ReserveVehicleOutcome::Reserved(vehicle.clone()))
        } else {
            Ok(ReserveVehicleOutcome::Unavailable)
        }
    }

    async fn release(
        &self,
        transaction_id: TransactionId,
        vehicle_id: VehicleId,
    ) -> Result<Option<Vehicle>> {
        let mut state = lock_write(&self.state)?;
        let Some(vehicle) = state.vehicles.get_mut(&vehicle_id) else {
            return Ok(None);
        };
        vehicle.release(transaction_id);
        Ok(Some(vehicle.clone()))
    }

    async fn mark_sold(&self, vehicle_id: VehicleId) -> Result<Vehicle> {
        let mut state = lock_write(&self.state)?;
        let vehicle = state
            .vehicles
            .get_mut(&vehicle_id)
            .ok_or(VehicleError::NotFound(vehicle_id))?;
        vehicle.mark_sold();
        Ok(vehicle.clone())
    }
}

fn lock_read(
    state: &Arc<RwLock<InMemoryVehicleState>>,
) -> Result<std::sync::RwLockReadGuard<'_, InMemoryVehicleState>> {
    state
        .read()
        .map_err(|_| VehicleError::Store("vehicle store lock poisoned".into()))
}

fn lock_write(
    state: &Arc<RwLock<InMemoryVehicleState>>,
) -> Result<std::sync::RwLockWriteGuard<'_, InMemoryVehicleState>> {
    state
        .write()
        .map_err(|_| VehicleError::Store("vehicle store lock poisoned".into()))
}
