use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::routing::RouteProvider;
use crate::geo::{haversine_km, round_km, ROAD_DETOUR_FACTOR};
use crate::models::caller::{Caller, Role};
use crate::models::location::GeoPoint;
use crate::models::pricing::{DeliveryPricing, PricingTable};
use crate::state::AppState;

const DEFAULT_BASE_FARE: f64 = 4000.0;
const DEFAULT_PER_KM: f64 = 2000.0;
/// Upper bound for any single rate in a pricing table.
pub const MAX_RATE: i64 = 100_000_000;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceSource {
    Road,
    StraightLine,
}

impl DistanceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceSource::Road => "road",
            DistanceSource::StraightLine => "straight_line",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FareEstimate {
    pub distance_km: f64,
    pub fare: i64,
    pub source: DistanceSource,
}

/// Maps a distance to a price. Without a pricing record the built-in formula
/// `max(4000, 4000 + km * 2000)` applies.
pub fn fare_for(distance_km: f64, pricing: Option<&PricingTable>) -> i64 {
    let d = distance_km.max(0.0);

    let Some(table) = pricing else {
        return (DEFAULT_BASE_FARE + d * DEFAULT_PER_KM)
            .max(DEFAULT_BASE_FARE)
            .round() as i64;
    };

    if d < 1.0 {
        table.under_1km
    } else if d < 1.5 {
        table.band_1_to_1_5
    } else if d < 2.0 {
        table.band_1_5_to_2
    } else if d < 2.5 {
        table.band_2_to_2_5
    } else if d < 3.0 {
        table.band_2_5_to_3
    } else {
        // `as` saturates; the sum must as well.
        let beyond = ((d - 3.0) * table.per_km_beyond_3 as f64).round() as i64;
        table.band_2_5_to_3.saturating_add(beyond)
    }
}

pub fn validate_table(table: &PricingTable) -> Result<(), AppError> {
    let bands = [
        table.under_1km,
        table.band_1_to_1_5,
        table.band_1_5_to_2,
        table.band_2_to_2_5,
        table.band_2_5_to_3,
    ];

    if bands.iter().any(|rate| *rate < 0) || table.per_km_beyond_3 < 0 {
        return Err(AppError::Validation("rates cannot be negative".to_string()));
    }
    if bands.iter().any(|rate| *rate > MAX_RATE) || table.per_km_beyond_3 > MAX_RATE {
        return Err(AppError::Validation(format!(
            "rates cannot exceed {MAX_RATE}"
        )));
    }
    if bands.windows(2).any(|pair| pair[1] < pair[0]) {
        return Err(AppError::Validation(
            "band rates must not decrease with distance".to_string(),
        ));
    }
    Ok(())
}

pub struct FareEstimator {
    router: Arc<dyn RouteProvider>,
}

impl FareEstimator {
    pub fn new(router: Arc<dyn RouteProvider>) -> Self {
        Self { router }
    }

    /// Road distance when the routing service has a route, otherwise the
    /// great-circle distance stretched by the detour factor.
    pub async fn distance_km(&self, from: &GeoPoint, to: &GeoPoint) -> (f64, DistanceSource) {
        match self.router.driving_distance_m(from, to).await {
            Some(meters) => (round_km(meters / 1000.0), DistanceSource::Road),
            None => (
                round_km(haversine_km(from, to) * ROAD_DETOUR_FACTOR),
                DistanceSource::StraightLine,
            ),
        }
    }

    pub async fn estimate(
        &self,
        from: &GeoPoint,
        to: &GeoPoint,
        pricing: Option<&PricingTable>,
    ) -> FareEstimate {
        let (distance_km, source) = self.distance_km(from, to).await;
        FareEstimate {
            distance_km,
            fare: fare_for(distance_km, pricing),
            source,
        }
    }
}

pub fn current_pricing(state: &AppState) -> Result<Option<DeliveryPricing>, AppError> {
    state.store.read(|t| t.current_pricing().cloned())
}

pub fn set_pricing(
    state: &AppState,
    caller: &Caller,
    table: PricingTable,
) -> Result<DeliveryPricing, AppError> {
    caller.require(Role::Admin)?;
    validate_table(&table)?;

    let pricing = DeliveryPricing {
        id: Uuid::new_v4(),
        table,
        created_by: caller.id,
        created_at: Utc::now(),
    };

    state.store.transaction(|tx| {
        tx.push_pricing(pricing.clone());
        Ok(())
    })?;

    info!(pricing_id = %pricing.id, admin_id = %caller.id, "delivery pricing updated");
    Ok(pricing)
}

pub async fn quote(state: &AppState, from: GeoPoint, to: GeoPoint) -> Result<FareEstimate, AppError> {
    if GeoPoint::checked(from.lat, from.lng).is_none() || GeoPoint::checked(to.lat, to.lng).is_none() {
        return Err(AppError::Validation("coordinates out of range".to_string()));
    }

    let pricing = current_pricing(state)?;
    let estimate = state
        .estimator
        .estimate(&from, &to, pricing.as_ref().map(|p| &p.table))
        .await;

    state
        .metrics
        .fare_estimates_total
        .with_label_values(&[estimate.source.as_str()])
        .inc();
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{fare_for, validate_table, DistanceSource, FareEstimator, MAX_RATE};
    use crate::geo::routing::{NoRouting, RouteProvider};
    use crate::models::location::GeoPoint;
    use crate::models::pricing::PricingTable;

    fn table() -> PricingTable {
        PricingTable {
            under_1km: 5000,
            band_1_to_1_5: 6000,
            band_1_5_to_2: 7000,
            band_2_to_2_5: 8000,
            band_2_5_to_3: 9000,
            per_km_beyond_3: 2500,
        }
    }

    struct FixedRoute(f64);

    #[async_trait]
    impl RouteProvider for FixedRoute {
        async fn driving_distance_m(&self, _from: &GeoPoint, _to: &GeoPoint) -> Option<f64> {
            Some(self.0)
        }
    }

    #[test]
    fn band_boundaries_are_half_open() {
        let t = table();
        assert_eq!(fare_for(0.99, Some(&t)), 5000);
        assert_eq!(fare_for(1.00, Some(&t)), 6000);
        assert_eq!(fare_for(1.49, Some(&t)), 6000);
        assert_eq!(fare_for(1.50, Some(&t)), 7000);
        assert_eq!(fare_for(2.00, Some(&t)), 8000);
        assert_eq!(fare_for(2.50, Some(&t)), 9000);
        assert_eq!(fare_for(2.99, Some(&t)), 9000);
        assert_eq!(fare_for(3.00, Some(&t)), 9000);
        assert_eq!(fare_for(4.00, Some(&t)), 11500);
    }

    #[test]
    fn default_formula_has_a_floor() {
        assert_eq!(fare_for(0.0, None), 4000);
        assert_eq!(fare_for(1.25, None), 6500);
        assert_eq!(fare_for(-3.0, None), 4000);
    }

    #[test]
    fn extreme_distances_saturate_instead_of_overflowing() {
        let t = table();
        assert_eq!(fare_for(1e16, Some(&t)), i64::MAX);
        assert_eq!(fare_for(f64::INFINITY, Some(&t)), i64::MAX);
        assert!(fare_for(1e16, None) > 0);

        let steep = PricingTable {
            under_1km: 0,
            band_1_to_1_5: 0,
            band_1_5_to_2: 0,
            band_2_to_2_5: 0,
            band_2_5_to_3: MAX_RATE,
            per_km_beyond_3: MAX_RATE,
        };
        assert!(validate_table(&steep).is_ok());
        assert!(fare_for(1e12, Some(&steep)) >= fare_for(4.0, Some(&steep)));
        assert_eq!(fare_for(1e12, Some(&steep)), i64::MAX);
    }

    #[test]
    fn oversized_rates_are_rejected() {
        let mut t = table();
        t.per_km_beyond_3 = i64::MAX;
        assert!(validate_table(&t).is_err());

        let mut t = table();
        t.band_2_5_to_3 = MAX_RATE + 1;
        assert!(validate_table(&t).is_err());
    }

    #[tokio::test]
    async fn huge_routing_distance_still_prices() {
        let estimator = FareEstimator::new(Arc::new(FixedRoute(1e19)));
        let a = GeoPoint { lat: -6.36, lng: 106.82 };
        let b = GeoPoint { lat: -6.37, lng: 106.83 };

        let estimate = estimator.estimate(&a, &b, Some(&table())).await;
        assert_eq!(estimate.source, DistanceSource::Road);
        assert_eq!(estimate.fare, i64::MAX);
    }

    #[test]
    fn fare_never_decreases_with_distance() {
        let t = table();
        for pricing in [None, Some(&t)] {
            let mut previous = i64::MIN;
            for step in 0..=800 {
                let fare = fare_for(step as f64 / 100.0, pricing);
                assert!(fare >= previous, "fare dropped at {} km", step as f64 / 100.0);
                previous = fare;
            }
        }
    }

    #[test]
    fn decreasing_bands_are_rejected() {
        let mut t = table();
        assert!(validate_table(&t).is_ok());
        t.band_2_to_2_5 = 6500;
        assert!(validate_table(&t).is_err());
        let mut t = table();
        t.per_km_beyond_3 = -1;
        assert!(validate_table(&t).is_err());
    }

    #[tokio::test]
    async fn road_distance_is_preferred_and_rounded() {
        let estimator = FareEstimator::new(Arc::new(FixedRoute(1234.0)));
        let a = GeoPoint { lat: -6.36, lng: 106.82 };
        let b = GeoPoint { lat: -6.37, lng: 106.83 };

        let estimate = estimator.estimate(&a, &b, None).await;
        assert_eq!(estimate.source, DistanceSource::Road);
        assert_eq!(estimate.distance_km, 1.23);
        assert_eq!(estimate.fare, 6460);
    }

    #[tokio::test]
    async fn falls_back_to_stretched_great_circle() {
        let estimator = FareEstimator::new(Arc::new(NoRouting));
        let a = GeoPoint { lat: 0.0, lng: 0.0 };
        let b = GeoPoint { lat: 0.0, lng: 0.01 };

        let (km, source) = estimator.distance_km(&a, &b).await;
        assert_eq!(source, DistanceSource::StraightLine);
        assert!((km - 1.45).abs() < 0.011, "got {km}");
    }
}
