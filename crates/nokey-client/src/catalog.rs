//! Declarative endpoint catalog
//!
//! Each upstream API is a configuration value, not a hand-written class:
//! a base URL, docs metadata, an optional throttle quota, and a list of
//! endpoint descriptors. Adding an endpoint is a data-entry task in
//! `catalog.toml`, never a code change.

use nokey_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// The full registry of known APIs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
  pub apis: Vec<ApiSpec>,
}

/// One upstream API: metadata, optional throttle, and its endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSpec {
  pub name: String,
  pub category: String,
  pub base_url: String,
  pub docs_url: String,
  #[serde(default)]
  pub about: String,
  /// Headers sent with every request to this API (some services want an
  /// explicit `Accept` or client identifier)
  #[serde(default)]
  pub headers: Vec<HeaderSpec>,
  #[serde(default)]
  pub rate_limit: Option<RateLimitSpec>,
  #[serde(default)]
  pub endpoints: Vec<EndpointSpec>,
}

/// One static header on an API.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderSpec {
  pub name: String,
  pub value: String,
}

/// Fixed-window quota for one API, shared by all its endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSpec {
  pub count: u32,
  pub period_secs: u64,
}

impl RateLimitSpec {
  pub fn period(&self) -> Duration {
    Duration::from_secs(self.period_secs)
  }
}

/// One callable operation: a path template with `{param}` placeholders,
/// a verb/body shape, a response kind, and the parameters it accepts.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSpec {
  pub name: String,
  pub path: String,
  #[serde(default)]
  pub method: EndpointMethod,
  #[serde(default)]
  pub response: ResponseKind,
  #[serde(default)]
  pub params: Vec<ParamSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndpointMethod {
  #[default]
  Get,
  PostJson,
  PostForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
  #[default]
  Json,
  Bytes,
}

/// Where a parameter lands in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
  /// Substituted into a `{name}` placeholder in the path template
  Path,
  #[default]
  Query,
  /// Collected into the JSON or form body
  Body,
}

/// One parameter: name, destination, and the preconditions checked before
/// any network call is made.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSpec {
  pub name: String,
  #[serde(default)]
  pub location: ParamLocation,
  #[serde(default)]
  pub required: bool,
  #[serde(default)]
  pub default: Option<Value>,
  /// String length bounds (e.g. is.gd vanity slugs must be 5-30 chars)
  #[serde(default)]
  pub min_len: Option<usize>,
  #[serde(default)]
  pub max_len: Option<usize>,
  /// Numeric bounds (e.g. the sudoku generator fill level tops out at 50)
  #[serde(default)]
  pub min: Option<i64>,
  #[serde(default)]
  pub max: Option<i64>,
}

impl Catalog {
  /// Parse the catalog shipped with the crate.
  pub fn builtin() -> Result<Self> {
    Self::from_toml(include_str!("../catalog.toml"))
  }

  /// Parse catalog data supplied by the caller.
  pub fn from_toml(data: &str) -> Result<Self> {
    toml::from_str(data).map_err(|e| Error::Config(format!("invalid catalog data: {e}")))
  }

  /// Look up an API by name.
  ///
  /// # Errors
  ///
  /// Returns `Error::Validation` for an unknown name.
  pub fn api(&self, name: &str) -> Result<&ApiSpec> {
    self
      .apis
      .iter()
      .find(|a| a.name == name)
      .ok_or_else(|| Error::Validation(format!("unknown API: {name}")))
  }

  /// Distinct categories, in catalog order.
  pub fn categories(&self) -> Vec<&str> {
    let mut seen = Vec::new();
    for api in &self.apis {
      if !seen.contains(&api.category.as_str()) {
        seen.push(api.category.as_str());
      }
    }
    seen
  }
}

impl ApiSpec {
  /// Look up an endpoint by name.
  ///
  /// # Errors
  ///
  /// Returns `Error::Validation` for an unknown name.
  pub fn endpoint(&self, name: &str) -> Result<&EndpointSpec> {
    self
      .endpoints
      .iter()
      .find(|e| e.name == name)
      .ok_or_else(|| Error::Validation(format!("unknown endpoint: {}/{name}", self.name)))
  }
}
