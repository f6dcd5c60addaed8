use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub geocode_hop_timeout: Duration,
    pub routing_url: Option<String>,
    pub routing_timeout: Duration,
    pub upload_dir: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: non_zero(
                "EVENT_BUFFER_SIZE",
                parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            )?,
            geocode_hop_timeout: Duration::from_millis(parse_or_default(
                "GEOCODE_HOP_TIMEOUT_MS",
                4000,
            )?),
            routing_url: optional("ROUTING_URL"),
            routing_timeout: Duration::from_millis(parse_or_default("ROUTING_TIMEOUT_MS", 3000)?),
            upload_dir: optional("UPLOAD_DIR"),
        })
    }
}

fn non_zero(key: &str, value: usize) -> Result<usize, AppError> {
    if value == 0 {
        return Err(AppError::Internal(format!("{key} must be greater than zero")));
    }
    Ok(value)
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
