use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// Acceptance window for a dispatch cycle. The product never settled on
    /// a single value (10-30s in the wild), so it stays configurable.
    pub dispatch_window_secs: u64,
    /// How long an emptied room survives before the reaper collects it.
    pub room_idle_ttl_secs: u64,
    pub route_poll_secs: u64,
    pub route_service_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 4000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            dispatch_window_secs: parse_or_default("DISPATCH_WINDOW_SECS", 30)?,
            room_idle_ttl_secs: parse_or_default("ROOM_IDLE_TTL_SECS", 120)?,
            route_poll_secs: parse_or_default("ROUTE_POLL_SECS", 15)?,
            route_service_url: env::var("ROUTE_SERVICE_URL")
                .unwrap_or_else(|_| "https://router.project-osrm.org".to_string()),
        })
    }
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
