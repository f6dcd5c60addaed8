use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::{GeoPoint, Region};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAvailability {
    pub driver_id: Uuid,
    pub region: Region,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreProfile {
    pub store_id: Uuid,
    pub name: String,
    pub address: String,
    pub coords: Option<GeoPoint>,
    pub map_link: Option<String>,
    pub region: Region,
    pub status: StoreStatus,
    pub updated_at: DateTime<Utc>,
}
