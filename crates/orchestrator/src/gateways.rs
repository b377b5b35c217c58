//! Synchronous HTTP gateways to peer services.
//!
//! The orchestrator reads the customer and vehicle records before starting
//! a saga, and PATCHes the vehicle sold at the final step. Participants
//! never call back into the orchestrator, so this direction stays acyclic.

use async_trait::async_trait;
use common::{CustomerId, Money, VehicleId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a peer-service call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The peer answered with an unexpected status.
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
}

/// Result type for gateway calls.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Customer record as served by the credit participant's boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: CustomerId,
    pub account_balance: Money,
    pub credit_limit: Money,
    pub available_credit: Money,
}

/// Vehicle record as served by the vehicle participant's boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSummary {
    pub id: VehicleId,
    pub model: String,
    pub price: Money,
    pub is_reserved: bool,
    pub is_sold: bool,
}

/// Read access to customer records.
#[async_trait]
pub trait CustomerGateway: Send + Sync {
    /// Fetches a customer; `None` when absent.
    async fn fetch(&self, customer_id: CustomerId) -> Result<Option<CustomerSummary>>;
}

/// Read and mark-as-sold access to vehicle records.
#[async_trait]
pub trait VehicleGateway: Send + Sync {
    /// Fetches a vehicle; `None` when absent.
    async fn fetch(&self, vehicle_id: VehicleId) -> Result<Option<VehicleSummary>>;

    /// Marks the vehicle sold and returns the updated record.
    async fn mark_as_sold(&self, vehicle_id: VehicleId) -> Result<VehicleSummary>;
}

/// HTTP client for the credit participant.
#[derive(Debug, Clone)]
pub struct HttpCustomerGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCustomerGateway {
    /// Creates a gateway for a base URL like `http://credit-service:8080`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CustomerGateway for HttpCustomerGateway {
    async fn fetch(&self, customer_id: CustomerId) -> Result<Option<CustomerSummary>> {
        let url = format!("{}/customers/{customer_id}", self.base_url);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(GatewayError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            }),
        }
    }
}

/// HTTP client for the vehicle participant.
#[derive(Debug, Clone)]
pub struct HttpVehicleGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVehicleGateway {
    /// Creates a gateway for a base URL like `http://vehicle-service:8080`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl VehicleGateway for HttpVehicleGateway {
    async fn fetch(&self, vehicle_id: VehicleId) -> Result<Option<VehicleSummary>> {
        let url = format!("{}/vehicles/{vehicle_id}", self.base_url);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(GatewayError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            }),
        }
    }

    async fn mark_as_sold(&self, vehicle_id: VehicleId) -> Result<VehicleSummary> {
        let url = format!("{}/vehicles/{vehicle_id}/mark_as_sold", self.base_url);
        let response = self.client.patch(&url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(GatewayError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_roundtrip_as_json() {
        let customer = CustomerSummary {
            id: CustomerId::new(),
            account_balance: Money::from_cents(6_000_000),
            credit_limit: Money::from_cents(2_000_000),
            available_credit: Money::from_cents(2_000_000),
        };
        let json = serde_json::to_string(&customer).unwrap();
        let back: CustomerSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.account_balance, customer.account_balance);

        let vehicle = VehicleSummary {
            id: VehicleId::new(),
            model: "Onix 1.0".into(),
            price: Money::from_cents(4_500_000),
            is_reserved: false,
            is_sold: false,
        };
        let json = serde_json::to_string(&vehicle).unwrap();
        let back: VehicleSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.price, vehicle.price);
    }
}
