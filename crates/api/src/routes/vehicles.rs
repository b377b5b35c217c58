//! Vehicle boundary endpoints: lookup and the orchestrator's synchronous
//! mark-as-sold call.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use common::{Money, VehicleId};
use orchestrator::SagaStore;
use serde::Serialize;
use vehicle::{Vehicle, VehicleStore};

use crate::error::ApiError;
use crate::routes::purchase::AppState;

#[derive(Serialize)]
pub struct VehicleResponse {
    pub id: String,
    pub model: String,
    pub license_plate: String,
    pub price: Money,
    pub is_reserved: bool,
    pub is_sold: bool,
}

impl From<Vehicle> for VehicleResponse {
    fn from(v: Vehicle) -> Self {
        Self {
            id: v.vehicle_id.to_string(),
            model: v.model,
            license_plate: v.license_plate,
            price: v.price,
            is_reserved: v.is_reserved,
            is_sold: v.is_sold,
        }
    }
}

/// GET /vehicles/{id}.
#[tracing::instrument(skip(state))]
pub async fn get<S: SagaStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<VehicleResponse>, ApiError> {
    let vehicle_id = parse_vehicle_id(&id)?;
    let vehicle = state
        .vehicle_store
        .get(vehicle_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("Vehicle {id} not found")))?;
    Ok(Json(vehicle.into()))
}

/// PATCH /vehicles/{id}/mark_as_sold — terminal; clears the reservation.
#[tracing::instrument(skip(state))]
pub async fn mark_as_sold<S: SagaStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<VehicleResponse>, ApiError> {
    let vehicle_id = parse_vehicle_id(&id)?;
    let vehicle = state
        .vehicle_store
        .mark_sold(vehicle_id)
        .await
        .map_err(|err| match err {
            vehicle::VehicleError::NotFound(_) => {
                ApiError::NotFound(format!("Vehicle {id} not found"))
            }
            other => ApiError::Internal(other.to_string()),
        })?;
    Ok(Json(vehicle.into()))
}

fn parse_vehicle_id(raw: &str) -> Result<VehicleId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid vehicle id: {e}")))
}
