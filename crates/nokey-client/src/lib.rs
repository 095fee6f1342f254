//! # nokey-client
//!
//! A data-driven client for public REST APIs that require no API key.
//!
//! ## Features
//!
//! - **Catalog-driven**: every API is a configuration value (base URL, docs,
//!   endpoint descriptors); adding an endpoint is data entry, not code
//! - **One dispatch path**: a single `call` function validates arguments,
//!   builds the URL, and classifies every failure into one error type
//! - **Built-in throttling**: fixed-window rate limiting per API, enforced
//!   before any network I/O
//! - **Optional response cache**: process-wide GET cache keyed by URL with
//!   a fixed TTL
//! - **Async/Await**: built on tokio and reqwest
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nokey_client::{ApiClient, CallArgs};
//! use nokey_core::Config;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new(&Config::from_env()?)?;
//!
//!     let mut args = CallArgs::new();
//!     args.insert("breed".to_string(), json!("akita"));
//!     let image = client.call("dog-api", "random-image-by-breed", args).await?;
//!     println!("{image}");
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All methods return `Result<T, nokey_core::Error>`; no failure panics and
//! no failure escapes as a raw transport error. Invalid arguments are
//! rejected as `Error::Validation` before any request is made.

#![warn(clippy::all)]

pub mod catalog;
pub mod client;
pub mod listing;
pub mod throttle;
pub mod transport;

pub use catalog::{ApiSpec, Catalog, EndpointMethod, EndpointSpec, ParamLocation, ParamSpec,
                  RateLimitSpec, ResponseKind};
pub use client::{ApiClient, CallArgs};
pub use nokey_core::{CacheConfig, Config, Error, HttpMethod, Result};
pub use throttle::Throttler;
pub use transport::{Payload, Transport};
