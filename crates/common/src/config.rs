use std::env;
use std::time::Duration;

pub const API_URL_ENV: &str = "TRADING_API_URL";
pub const WS_URL_ENV: &str = "TRADING_WS_URL";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8007";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8007/ws";

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(5000);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-collection cap for the append-only store slices.
pub const DEFAULT_RETENTION: usize = 200;
pub const BACKFILL_LIMIT: usize = 50;
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub ws_url: String,
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            api_base_url: read(API_URL_ENV, DEFAULT_API_BASE_URL),
            ws_url: read(WS_URL_ENV, DEFAULT_WS_URL),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
