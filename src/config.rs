//! Configuration loading
//!
//! Environment-based configuration with a `LIVEMAP_` prefix, typed parsing,
//! defaults for optional fields, and validation with the offending key in
//! the error. `.env` files are supported via dotenvy.

use crate::EngineError;
use std::time::Duration;
use url::Url;

/// SHA-256 digest the password gate checks against when none is configured
pub const DEFAULT_PASSWORD_HASH: &str =
    "bf267542668516d323ca59a4408c7b92eab9658ef0c6f1e355efbc77b3a50914";

/// Configuration loader trait
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, EngineError>;

    /// Validate configuration values
    fn validate(&self) -> Result<(), EngineError>;
}

/// Engine configuration
///
/// # Environment Variables
///
/// - `LIVEMAP_SNAPSHOT_URL` (optional): pre-aggregated snapshot endpoint;
///   polling is disabled when unset
/// - `LIVEMAP_POLL_INTERVAL_SECS` (optional): snapshot poll interval
///   (default: 300)
/// - `LIVEMAP_RECENCY_WINDOW_MS` (optional): recently-active highlight
///   lifetime (default: 3000)
/// - `LIVEMAP_RECENT_EVENTS_CAPACITY` (optional): live-feed length
///   (default: 20)
/// - `LIVEMAP_SHOW_INACTIVE_REGIONS` (optional): include zero-user regions
///   in published snapshots (default: true)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub snapshot_url: Option<String>,
    pub poll_interval: Duration,
    pub recency_window: Duration,
    pub recent_events_capacity: usize,
    pub show_inactive_regions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_url: None,
            poll_interval: Duration::from_secs(300),
            recency_window: Duration::from_millis(3000),
            recent_events_capacity: crate::events::RECENT_EVENTS_CAPACITY,
            show_inactive_regions: true,
        }
    }
}

impl ConfigLoader for EngineConfig {
    fn from_env() -> Result<Self, EngineError> {
        let snapshot_url = std::env::var("LIVEMAP_SNAPSHOT_URL").ok();

        let poll_interval_secs = parse_env_var("LIVEMAP_POLL_INTERVAL_SECS", 300u64)?;
        let recency_window_ms = parse_env_var("LIVEMAP_RECENCY_WINDOW_MS", 3000u64)?;
        let recent_events_capacity = parse_env_var(
            "LIVEMAP_RECENT_EVENTS_CAPACITY",
            crate::events::RECENT_EVENTS_CAPACITY,
        )?;
        let show_inactive_regions = parse_env_var("LIVEMAP_SHOW_INACTIVE_REGIONS", true)?;

        Ok(Self {
            snapshot_url,
            poll_interval: Duration::from_secs(poll_interval_secs),
            recency_window: Duration::from_millis(recency_window_ms),
            recent_events_capacity,
            show_inactive_regions,
        })
    }

    fn validate(&self) -> Result<(), EngineError> {
        if let Some(url) = &self.snapshot_url {
            Url::parse(url).map_err(|e| EngineError::ConfigurationError {
                message: format!("Invalid LIVEMAP_SNAPSHOT_URL: {}", e),
                key: Some("LIVEMAP_SNAPSHOT_URL".to_string()),
            })?;
        }

        if self.poll_interval.as_secs() == 0 {
            return Err(EngineError::ConfigurationError {
                message: "poll_interval must be greater than 0 seconds".to_string(),
                key: Some("LIVEMAP_POLL_INTERVAL_SECS".to_string()),
            });
        }

        if self.recency_window.as_millis() == 0 {
            return Err(EngineError::ConfigurationError {
                message: "recency_window must be greater than 0 ms".to_string(),
                key: Some("LIVEMAP_RECENCY_WINDOW_MS".to_string()),
            });
        }

        if self.recent_events_capacity == 0 {
            return Err(EngineError::ConfigurationError {
                message: "recent_events_capacity must be greater than 0".to_string(),
                key: Some("LIVEMAP_RECENT_EVENTS_CAPACITY".to_string()),
            });
        }

        Ok(())
    }
}

/// Password-gate configuration
///
/// # Environment Variables
///
/// - `LIVEMAP_PASSWORD_HASH` (optional): hex SHA-256 digest of the dashboard
///   password (default: the built-in digest)
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub password_hash: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_hash: DEFAULT_PASSWORD_HASH.to_string(),
        }
    }
}

impl ConfigLoader for AuthConfig {
    fn from_env() -> Result<Self, EngineError> {
        let password_hash = std::env::var("LIVEMAP_PASSWORD_HASH")
            .unwrap_or_else(|_| DEFAULT_PASSWORD_HASH.to_string());
        Ok(Self { password_hash })
    }

    fn validate(&self) -> Result<(), EngineError> {
        let is_hex_digest = self.password_hash.len() == 64
            && self.password_hash.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex_digest {
            return Err(EngineError::ConfigurationError {
                message: "password_hash must be a 64-character hex SHA-256 digest".to_string(),
                key: Some("LIVEMAP_PASSWORD_HASH".to_string()),
            });
        }
        Ok(())
    }
}

/// Helper to parse an environment variable with a default value
fn parse_env_var<T>(key: &str, default: T) -> Result<T, EngineError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>().map_err(|e| EngineError::ConfigurationError {
                message: format!("Failed to parse {}: {}", key, e),
                key: Some(key.to_string()),
            })
        })
        .unwrap_or(Ok(default))
}

/// Load a .env file if present
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}
