use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tiered fare table. Bands are half-open on the upper end:
/// `[0, 1)`, `[1, 1.5)`, `[1.5, 2)`, `[2, 2.5)`, `[2.5, 3)`, then
/// `band_2_5_to_3 + (d - 3) * per_km_beyond_3` from 3 km on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingTable {
    pub under_1km: i64,
    pub band_1_to_1_5: i64,
    pub band_1_5_to_2: i64,
    pub band_2_to_2_5: i64,
    pub band_2_5_to_3: i64,
    pub per_km_beyond_3: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPricing {
    pub id: Uuid,
    #[serde(flatten)]
    pub table: PricingTable,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
