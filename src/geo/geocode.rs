use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::error::AppError;
use crate::models::location::GeoPoint;

pub const MAX_REDIRECT_HOPS: usize = 5;
const MAX_BODY_BYTES: usize = 1024 * 1024;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; campus-dispatch/0.1)";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(String),
}

/// One response as seen by the redirect walk.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// Address the response was served from.
    pub url: String,
    pub location: Option<String>,
    /// Only read when there is no `location` to follow.
    pub body: Option<String>,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// A single request that does not follow redirects.
    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// A request that lets the client follow redirects to the end.
    async fn fetch_following(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

pub struct HttpPageFetcher {
    manual: Client,
    following: Client,
}

impl HttpPageFetcher {
    pub fn new(hop_timeout: Duration) -> Result<Self, AppError> {
        let build = |policy: Policy| {
            Client::builder()
                .redirect(policy)
                .timeout(hop_timeout)
                .user_agent(USER_AGENT)
                .build()
                .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))
        };

        Ok(Self {
            manual: build(Policy::none())?,
            following: build(Policy::limited(10))?,
        })
    }
}

async fn read_capped(mut response: reqwest::Response) -> Result<String, FetchError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| FetchError::Network(err.to_string()))?
    {
        let room = MAX_BODY_BYTES - buffer.len();
        buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if buffer.len() >= MAX_BODY_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .manual
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;

        let resolved = response.url().to_string();
        let location = response
            .status()
            .is_redirection()
            .then(|| response.headers().get(reqwest::header::LOCATION))
            .flatten()
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = match location {
            Some(_) => None,
            None => Some(read_capped(response).await?),
        };

        Ok(FetchedPage {
            url: resolved,
            location,
            body,
        })
    }

    async fn fetch_following(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .following
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;

        let resolved = response.url().to_string();
        let body = read_capped(response).await?;

        Ok(FetchedPage {
            url: resolved,
            location: None,
            body: Some(body),
        })
    }
}

/// Fetcher for deployments without outbound network access.
pub struct NoNetwork;

#[async_trait]
impl PageFetcher for NoNetwork {
    async fn fetch_once(&self, _url: &str) -> Result<FetchedPage, FetchError> {
        Err(FetchError::Network("network access disabled".to_string()))
    }

    async fn fetch_following(&self, _url: &str) -> Result<FetchedPage, FetchError> {
        Err(FetchError::Network("network access disabled".to_string()))
    }
}

fn query_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:^|[?&;]|&amp;|\\u0026)(?:q|query|ll|destination|center)=(?:loc:)?(?:\s|\+|%20)*(-?\d{1,3}(?:\.\d+)?)(?:\s|\+|%20)*(?:,|%2C|%2c)(?:\s|\+|%20)*(-?\d{1,3}(?:\.\d+)?)",
        )
        .expect("valid query pair regex")
    })
}

fn camera_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@(-?\d{1,3}\.\d+),(-?\d{1,3}\.\d+)").expect("valid camera marker regex")
    })
}

fn data_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"!3d(-?\d{1,3}\.\d+)!4d(-?\d{1,3}\.\d+)").expect("valid data marker regex")
    })
}

fn meta_refresh_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta[^>]*http-equiv\s*=\s*["']?refresh["']?[^>]*content\s*=\s*["'][^"']*?url\s*=\s*'?([^"'>\s]+)"#,
        )
        .expect("valid meta refresh regex")
    })
}

fn point_from(captures: regex::Captures<'_>) -> Option<GeoPoint> {
    let lat = captures.get(1)?.as_str().parse().ok()?;
    let lng = captures.get(2)?.as_str().parse().ok()?;
    GeoPoint::checked(lat, lng)
}

fn first_pair(re: &Regex, text: &str) -> Option<GeoPoint> {
    re.captures_iter(text).find_map(point_from)
}

fn last_pair(re: &Regex, text: &str) -> Option<GeoPoint> {
    re.captures_iter(text).filter_map(point_from).last()
}

/// Coordinates encoded directly in a link: `q=lat,lng` style query
/// parameters or an `@lat,lng` path marker.
pub fn extract_direct(text: &str) -> Option<GeoPoint> {
    first_pair(query_pair_re(), text).or_else(|| first_pair(camera_marker_re(), text))
}

/// Coordinates embedded in a fetched page. Pages can carry a default
/// position ahead of the real one, so marker matches take the last hit.
pub fn extract_from_body(body: &str) -> Option<GeoPoint> {
    first_pair(query_pair_re(), body)
        .or_else(|| last_pair(data_marker_re(), body))
        .or_else(|| last_pair(camera_marker_re(), body))
}

fn meta_refresh_target(body: &str) -> Option<String> {
    meta_refresh_re()
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace("&amp;", "&"))
}

fn is_http_url(text: &str) -> bool {
    Url::parse(text)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn join_url(base: &str, target: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(target))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| target.to_string())
}

enum Hop {
    Found(GeoPoint),
    Next(String),
    DeadEnd,
}

pub struct Geocoder {
    fetcher: Arc<dyn PageFetcher>,
}

impl Geocoder {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolves a location reference to coordinates. Never fails: anything
    /// that cannot be resolved, including upstream errors, yields `None`.
    pub async fn resolve(&self, reference: &str) -> Option<GeoPoint> {
        let reference = reference.trim();

        if let Some(point) = extract_direct(reference) {
            return Some(point);
        }
        if !is_http_url(reference) {
            return None;
        }

        match self.walk(reference).await {
            Ok(point) => point,
            Err(err) => {
                warn!(error = %err, reference, "map link resolution aborted");
                None
            }
        }
    }

    async fn walk(&self, start: &str) -> Result<Option<GeoPoint>, FetchError> {
        let mut current = start.to_string();

        for hop in 0..MAX_REDIRECT_HOPS {
            let page = self.fetcher.fetch_once(&current).await?;
            debug!(hop, url = %page.url, "map link hop");

            match Self::inspect(&page) {
                Hop::Found(point) => return Ok(Some(point)),
                Hop::Next(target) => {
                    let next = join_url(&page.url, &target);
                    if let Some(point) = extract_direct(&next) {
                        return Ok(Some(point));
                    }
                    current = next;
                }
                Hop::DeadEnd => break,
            }
        }

        let page = self.fetcher.fetch_following(&current).await?;
        let point = extract_direct(&page.url)
            .or_else(|| page.body.as_deref().and_then(extract_from_body));

        if point.is_none() {
            debug!(reference = start, "map link did not yield coordinates");
        }
        Ok(point)
    }

    fn inspect(page: &FetchedPage) -> Hop {
        if let Some(point) = extract_direct(&page.url) {
            return Hop::Found(point);
        }
        if let Some(location) = &page.location {
            return Hop::Next(location.clone());
        }

        let body = page.body.as_deref().unwrap_or_default();
        if let Some(target) = meta_refresh_target(body) {
            return Hop::Next(target);
        }
        match extract_from_body(body) {
            Some(point) => Hop::Found(point),
            None => Hop::DeadEnd,
        }
    }
}
