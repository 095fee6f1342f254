//! Configuration management for the nokey client

use crate::error::{Error, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;

/// Main configuration struct for the nokey client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
  /// Request timeout in seconds
  pub timeout_secs: u64,

  /// User agent sent with every request
  pub user_agent: String,

  /// Process-wide GET response cache settings
  pub cache: CacheConfig,
}

/// Settings for the process-wide HTTP response cache.
///
/// The cache itself is an external collaborator (moka); this struct only
/// toggles installation and sizes it. Entries are keyed by full request URL
/// with a fixed time-to-live.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
  /// Whether to install the cache at construction
  pub enabled: bool,

  /// Cache name, used for logging only
  pub name: String,

  /// Maximum number of cached responses
  pub max_entries: u64,

  /// Time-to-live for cached responses, in seconds
  pub ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    CacheConfig {
      enabled: false,
      name: "nokey_cache".to_string(),
      max_entries: crate::DEFAULT_CACHE_MAX_ENTRIES,
      ttl_secs: crate::DEFAULT_CACHE_TTL_SECS,
    }
  }
}

impl Config {
  /// Load configuration from environment variables
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let timeout_secs = env::var("NOKEY_TIMEOUT_SECS")
      .unwrap_or_else(|_| crate::DEFAULT_TIMEOUT_SECS.to_string())
      .parse()
      .map_err(|_| Error::Config("Invalid NOKEY_TIMEOUT_SECS".to_string()))?;

    let user_agent =
      env::var("NOKEY_USER_AGENT").unwrap_or_else(|_| crate::DEFAULT_USER_AGENT.to_string());

    let enabled = env::var("NOKEY_CACHE")
      .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
      .unwrap_or(false);

    let name = env::var("NOKEY_CACHE_NAME").unwrap_or_else(|_| "nokey_cache".to_string());

    let max_entries = env::var("NOKEY_CACHE_MAX_ENTRIES")
      .unwrap_or_else(|_| crate::DEFAULT_CACHE_MAX_ENTRIES.to_string())
      .parse()
      .map_err(|_| Error::Config("Invalid NOKEY_CACHE_MAX_ENTRIES".to_string()))?;

    let ttl_secs = env::var("NOKEY_CACHE_TTL_SECS")
      .unwrap_or_else(|_| crate::DEFAULT_CACHE_TTL_SECS.to_string())
      .parse()
      .map_err(|_| Error::Config("Invalid NOKEY_CACHE_TTL_SECS".to_string()))?;

    Ok(Config {
      timeout_secs,
      user_agent,
      cache: CacheConfig { enabled, name, max_entries, ttl_secs },
    })
  }

  /// Create a config with default values (for testing)
  pub fn default_config() -> Self {
    Config {
      timeout_secs: crate::DEFAULT_TIMEOUT_SECS,
      user_agent: crate::DEFAULT_USER_AGENT.to_string(),
      cache: CacheConfig::default(),
    }
  }

  /// Same defaults, but with the response cache switched on
  pub fn with_caching(mut self) -> Self {
    self.cache.enabled = true;
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::default_config()
  }
}
