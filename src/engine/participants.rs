use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::models::caller::{Caller, Role};
use crate::models::location::{GeoPoint, Region};
use crate::models::participant::{DriverAvailability, StoreProfile, StoreStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityRequest {
    pub region: Region,
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreProfileRequest {
    pub name: String,
    pub address: String,
    pub map_link: Option<String>,
    pub region: Region,
    pub status: StoreStatus,
}

pub fn set_driver_availability(
    state: &AppState,
    caller: &Caller,
    request: AvailabilityRequest,
) -> Result<DriverAvailability, AppError> {
    caller.require(Role::Driver)?;

    let availability = DriverAvailability {
        driver_id: caller.id,
        region: request.region,
        active: request.active,
        updated_at: Utc::now(),
    };

    state.store.transaction(|tx| {
        tx.put_driver(availability.clone());
        Ok(())
    })?;

    info!(
        driver_id = %caller.id,
        region = ?availability.region,
        active = availability.active,
        "driver availability updated"
    );
    Ok(availability)
}

pub fn driver_availability(
    state: &AppState,
    caller: &Caller,
) -> Result<Option<DriverAvailability>, AppError> {
    caller.require(Role::Driver)?;
    state.store.read(|t| t.drivers.get(&caller.id).cloned())
}

pub async fn set_store_profile(
    state: &AppState,
    caller: &Caller,
    request: StoreProfileRequest,
) -> Result<StoreProfile, AppError> {
    caller.require(Role::Store)?;

    if request.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if request.address.trim().is_empty() {
        return Err(AppError::Validation("address cannot be empty".to_string()));
    }

    let coords: Option<GeoPoint> = match &request.map_link {
        Some(link) => crate::engine::orders::resolve_link(state, link).await,
        None => None,
    };

    let profile = StoreProfile {
        store_id: caller.id,
        name: request.name.trim().to_string(),
        address: request.address.trim().to_string(),
        coords,
        map_link: request.map_link,
        region: request.region,
        status: request.status,
        updated_at: Utc::now(),
    };

    state.store.transaction(|tx| {
        tx.put_store(profile.clone());
        Ok(())
    })?;

    info!(store_id = %caller.id, status = ?profile.status, "store profile updated");
    Ok(profile)
}
