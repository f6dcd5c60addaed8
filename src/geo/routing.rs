use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;
use crate::models::location::GeoPoint;

/// Road routing lookup. `None` means no usable route, for whatever reason.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn driving_distance_m(&self, from: &GeoPoint, to: &GeoPoint) -> Option<f64>;
}

pub struct NoRouting;

#[async_trait]
impl RouteProvider for NoRouting {
    async fn driving_distance_m(&self, _from: &GeoPoint, _to: &GeoPoint) -> Option<f64> {
        None
    }
}

/// Client for an OSRM-compatible `/route/v1/driving` endpoint.
pub struct OsrmRouter {
    base_url: String,
    client: Client,
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64,
}

impl OsrmRouter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build routing client: {err}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn route_url(&self, from: &GeoPoint, to: &GeoPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.base_url, from.lng, from.lat, to.lng, to.lat
        )
    }
}

#[async_trait]
impl RouteProvider for OsrmRouter {
    async fn driving_distance_m(&self, from: &GeoPoint, to: &GeoPoint) -> Option<f64> {
        let url = self.route_url(from, to);

        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "routing service returned an error status");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "routing service unreachable");
                return None;
            }
        };

        match response.json::<OsrmResponse>().await {
            Ok(body) if body.code == "Ok" => body
                .routes
                .first()
                .map(|route| route.distance)
                .filter(|meters| meters.is_finite() && *meters >= 0.0),
            Ok(body) => {
                warn!(code = %body.code, "routing service found no route");
                None
            }
            Err(err) => {
                warn!(error = %err, "routing response could not be decoded");
                None
            }
        }
    }
}
