pub mod config;
pub mod error;

pub use config::{CacheConfig, Config};
pub use error::{Error, Result};

/// HTTP methods supported by the request executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
  Get,
  Post,
}

impl std::fmt::Display for HttpMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      HttpMethod::Get => write!(f, "GET"),
      HttpMethod::Post => write!(f, "POST"),
    }
  }
}

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("nokey/", env!("CARGO_PKG_VERSION"));

/// Response cache defaults
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
