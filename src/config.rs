//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8000)
//! - `OUTPUT_JSON` - Active order file (default: output.json)
//! - `DONE_JSON` - Finalized order ids (default: done_orders.json)
//! - `ARCHIVE_JSON` - Archived orders (default: archive.json)
//! - `LOCATIONS_CSV` - Shelf locations (default: locations.csv)
//! - `TOKEN_PATH` - File holding the API token (default: token.txt)
//! - `API_BASE_URL` - Integration API root (default: https://apiv2.entegrabilisim.com)
//! - `FETCH_WINDOW_HOURS` - How far back each fetch looks (default: 18)
//! - `PAGE_SIZE` - Orders per page (default: 200)
//! - `REFRESH_INTERVAL_MINUTES` - Background refresh period, 0 disables (default: 30)
//! - `ARCHIVE_RETENTION_DAYS` - Age at which completed orders are archived (default: 30)
//! - `STATUS_KEYWORDS` - JSON file overriding the status keyword lists

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::domain::value_objects::StatusKeywords;
use crate::store::StorePaths;

pub const DEFAULT_API_BASE_URL: &str = "https://apiv2.entegrabilisim.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Cannot read status keywords from {}: {1}", .0.display())]
    Keywords(PathBuf, String),
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub token_path: PathBuf,
    pub window_hours: i64,
    pub page_size: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub store: StorePaths,
    pub locations_path: PathBuf,
    pub fetch: FetchConfig,
    /// `None` disables the background refresh.
    pub refresh_interval: Option<Duration>,
    pub archive_retention_days: i64,
    pub status_keywords_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> { Self::from_lookup(|key| std::env::var(key).ok()) }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let path = |key: &str, default: &str| PathBuf::from(get(key).unwrap_or_else(|| default.to_string()));

        let refresh_minutes: u64 = parse_or(get("REFRESH_INTERVAL_MINUTES"), "REFRESH_INTERVAL_MINUTES", 30)?;
        let page_size: usize = parse_or(get("PAGE_SIZE"), "PAGE_SIZE", 200)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidEnvVar("PAGE_SIZE".into(), "must be at least 1".into()));
        }

        Ok(Self {
            host: parse_or(get("HOST"), "HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or(get("PORT"), "PORT", 8000)?,
            store: StorePaths {
                orders: path("OUTPUT_JSON", "output.json"),
                done: path("DONE_JSON", "done_orders.json"),
                archive: path("ARCHIVE_JSON", "archive.json"),
            },
            locations_path: path("LOCATIONS_CSV", "locations.csv"),
            fetch: FetchConfig {
                base_url: get("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
                token_path: path("TOKEN_PATH", "token.txt"),
                window_hours: parse_or(get("FETCH_WINDOW_HOURS"), "FETCH_WINDOW_HOURS", 18)?,
                page_size,
            },
            refresh_interval: (refresh_minutes > 0).then(|| Duration::from_secs(refresh_minutes * 60)),
            archive_retention_days: parse_or(get("ARCHIVE_RETENTION_DAYS"), "ARCHIVE_RETENTION_DAYS", 30)?,
            status_keywords_path: get("STATUS_KEYWORDS").map(PathBuf::from),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }

    /// Keyword lists from `STATUS_KEYWORDS`, or the built-in defaults.
    pub fn status_keywords(&self) -> Result<StatusKeywords, ConfigError> {
        let Some(path) = &self.status_keywords_path else { return Ok(StatusKeywords::default()) };
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Keywords(path.clone(), e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Keywords(path.clone(), e.to_string()))
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}
