//! In-process gateways for the single-binary deployment.
//!
//! When every participant runs in this process, the orchestrator's
//! synchronous peer reads go straight to the participant stores instead of
//! over HTTP. Split deployments swap these for the HTTP gateways.

use async_trait::async_trait;
use common::{CustomerId, VehicleId};
use credit::{CreditStore, InMemoryCreditStore};
use orchestrator::{
    CustomerGateway, CustomerSummary, GatewayError, VehicleGateway, VehicleSummary,
};
use vehicle::{InMemoryVehicleStore, Vehicle, VehicleStore};

fn internal(err: impl std::fmt::Display) -> GatewayError {
    GatewayError::UnexpectedStatus {
        status: 500,
        url: err.to_string(),
    }
}

fn vehicle_summary(v: Vehicle) -> VehicleSummary {
    VehicleSummary {
        id: v.vehicle_id,
        model: v.model,
        price: v.price,
        is_reserved: v.is_reserved,
        is_sold: v.is_sold,
    }
}

/// Reads customer records from the in-process credit store.
#[derive(Clone)]
pub struct LocalCustomerGateway {
    store: InMemoryCreditStore,
}

impl LocalCustomerGateway {
    pub fn new(store: InMemoryCreditStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CustomerGateway for LocalCustomerGateway {
    async fn fetch(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<CustomerSummary>, GatewayError> {
        let account = self.store.get(customer_id).await.map_err(internal)?;
        Ok(account.map(|a| CustomerSummary {
            id: a.customer_id,
            account_balance: a.account_balance,
            credit_limit: a.credit_limit,
            available_credit: a.available_credit(),
        }))
    }
}

/// Reads and sells vehicles through the in-process vehicle store.
#[derive(Clone)]
pub struct LocalVehicleGateway {
    store: InMemoryVehicleStore,
}

impl LocalVehicleGateway {
    pub fn new(store: InMemoryVehicleStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VehicleGateway for LocalVehicleGateway {
    async fn fetch(&self, vehicle_id: VehicleId) -> Result<Option<VehicleSummary>, GatewayError> {
        let vehicle = self.store.get(vehicle_id).await.map_err(internal)?;
        Ok(vehicle.map(vehicle_summary))
    }

    async fn mark_as_sold(&self, vehicle_id: VehicleId) -> Result<VehicleSummary, GatewayError> {
        self.store
            .mark_sold(vehicle_id)
            .await
            .map(vehicle_summary)
            .map_err(|err| GatewayError::UnexpectedStatus {
                status: 404,
                url: err.to_string(),
            })
    }
}
