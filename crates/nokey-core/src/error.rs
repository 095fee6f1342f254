use thiserror::Error;

/// The main error type for the nokey crates.
///
/// Every failure mode of a request is recovered at the transport boundary
/// and surfaced as one of these variants; callers never see a panic or an
/// uncaught transport exception.
#[derive(Error, Debug)]
pub enum Error {
  /// Non-2xx HTTP response, with the server's `"message"` field when the
  /// error body was JSON and carried one
  #[error("HTTP error: {status} {reason}")]
  Http {
    status: u16,
    reason: String,
    server_message: Option<String>,
  },

  /// Request deadline elapsed
  #[error("request timed out")]
  Timeout,

  /// Transport-level failure (DNS, connection refused, malformed response)
  #[error("transport error: {0}")]
  Transport(String),

  /// Caller-supplied argument violates an endpoint's parameter spec.
  /// Raised before any network I/O is performed.
  #[error("validation error: {0}")]
  Validation(String),

  /// Configuration error (zero throttle quota, unparsable env var,
  /// bad base URL in the catalog)
  #[error("configuration error: {0}")]
  Config(String),

  /// A throttle wait was abandoned because it would overrun the caller's
  /// deadline
  #[error("rate limit exceeded: {0}")]
  RateLimit(String),

  /// Serialization/Deserialization error
  #[error("serialization error: {0}")]
  Serde(#[from] serde_json::Error),

  /// General unexpected error, including undecodable 2xx bodies
  #[error("unexpected error: {0}")]
  Unexpected(String),
}

/// Result type alias for the nokey crates
pub type Result<T> = std::result::Result<T, Error>;
