//! Configuration and settings management
//!
//! Loads settings from environment variables and defines tuning constants
//! for the upstream access layer.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Checko API key (primary registry source)
    pub checko_api_key: Option<String>,

    /// DaData API key (secondary/enrichment source)
    pub dadata_api_key: Option<String>,

    /// Path to the durable lookup cache database
    #[serde(default = "default_cache_db_path")]
    pub cache_db_path: String,

    /// Path to the OKVED/region reference database
    #[serde(default = "default_reference_db_path")]
    pub reference_db_path: String,
}

fn default_cache_db_path() -> String {
    "data/cache.sqlite".to_string()
}

fn default_reference_db_path() -> String {
    "data/reference.sqlite".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kontragent_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Settings from environment variables directly.
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }
}

/// HTTP request timeout for upstream registry calls, overridable via
/// `HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_http_timeout_secs() -> u64 {
    std::env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(HTTP_TIMEOUT_SECS)
}

// Upstream access layer configuration
/// Default HTTP timeout for registry calls
pub const HTTP_TIMEOUT_SECS: u64 = 15;
/// Retry attempts after the initial try for transient upstream failures
pub const HTTP_MAX_RETRIES: usize = 2;
/// Initial retry backoff delay
pub const RETRY_BASE_DELAY_MS: u64 = 1000;
/// Cap on a single retry backoff delay
pub const RETRY_MAX_DELAY_MS: u64 = 8000;
/// Consecutive failures that trip a client's circuit breaker
pub const BREAKER_FAILURE_THRESHOLD: u32 = 5;
/// How long a tripped circuit stays open before a probe is allowed
pub const BREAKER_COOLDOWN_SECS: u64 = 60;
/// Outbound requests per second allowed toward one upstream registry
pub const UPSTREAM_RATE_PER_SEC: usize = 5;

// Cache TTLs by volatility class
/// Main entity card: identity/registry data, refreshed twice a day
pub const TTL_CARD_SECS: u64 = 12 * 3600;
/// Lazy sections (courts, debts, checks): updated upstream about daily
pub const TTL_SECTION_SECS: u64 = 24 * 3600;
/// Financial statements change at most annually
pub const TTL_FINANCE_SECS: u64 = 7 * 24 * 3600;
/// Short in-memory cache for DaData suggestions
pub const DADATA_CACHE_TTL_SECS: u64 = 900;
/// Capacity of the DaData suggestion cache
pub const DADATA_CACHE_MAX_CAPACITY: u64 = 512;

// Bot-side throttling
/// Minimum interval between lookups from one user
pub const USER_MIN_INTERVAL_MS: u64 = 500;
/// Cooldown between "slow down" notices to the same user
pub const RATE_NOTICE_COOLDOWN_SECS: u64 = 30;
/// TTL for rate-notice cooldown entries
pub const RATE_NOTICE_TTL_SECS: u64 = 300;
/// Maximum tracked users in the rate-notice cache
pub const RATE_NOTICE_MAX_CAPACITY: u64 = 10_000;
/// How long the bot remembers the last entity a chat looked at
pub const SESSION_TTL_SECS: u64 = 6 * 3600;
/// Maximum tracked chats in the session store
pub const SESSION_MAX_CAPACITY: u64 = 10_000;

/// Telegram hard limit on message length, with headroom for closing tags
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;
/// Interval between background cache cleanup sweeps
pub const CACHE_CLEANUP_INTERVAL_SECS: u64 = 3600;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // One test owns all env mutations to avoid races between parallel tests
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("TELEGRAM_TOKEN", "dummy_token");
        env::set_var("CHECKO_API_KEY", "checko_key");
        env::set_var("DADATA_API_KEY", "");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.checko_api_key, Some("checko_key".to_string()));
        // Empty env vars are treated as unset
        assert_eq!(settings.dadata_api_key, None);
        assert_eq!(settings.cache_db_path, "data/cache.sqlite");

        env::remove_var("TELEGRAM_TOKEN");
        env::remove_var("CHECKO_API_KEY");
        env::remove_var("DADATA_API_KEY");
        Ok(())
    }
}
