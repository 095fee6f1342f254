//! Generic endpoint dispatch
//!
//! One `call` function replaces a wrapper method per endpoint: it looks the
//! operation up in the catalog, validates the supplied arguments against the
//! parameter specs, builds the request URL and body, gates on the API's
//! throttler, and hands off to the transport. All preconditions are checked
//! before any network I/O.

use crate::catalog::{ApiSpec, Catalog, EndpointMethod, EndpointSpec, ParamLocation, ResponseKind};
use crate::throttle::Throttler;
use crate::transport::{Payload, Transport};
use bytes::Bytes;
use nokey_core::{Config, Error, HttpMethod, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// Arguments for one endpoint call, keyed by parameter name.
pub type CallArgs = HashMap<String, Value>;

/// Client over the whole catalog.
///
/// Holds one shared transport and one throttler per rate-limited API. The
/// throttler is owned here explicitly, not hidden in per-endpoint state, so
/// its sharing scope (all endpoints of one API) is visible and testable.
pub struct ApiClient {
  transport: Arc<Transport>,
  catalog: Catalog,
  throttlers: HashMap<String, Arc<Throttler>>,
}

impl std::fmt::Debug for ApiClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ApiClient")
      .field("transport", &self.transport)
      .field("apis", &self.catalog.apis.len())
      .field("throttled_apis", &self.throttlers.len())
      .finish()
  }
}

struct PreparedRequest {
  method: HttpMethod,
  url: Url,
  headers: Vec<(String, String)>,
  payload: Payload,
}

impl ApiClient {
  /// Create a client over the builtin catalog.
  pub fn new(config: &Config) -> Result<Self> {
    Self::with_catalog(config, Catalog::builtin()?)
  }

  /// Create a client over caller-supplied catalog data.
  ///
  /// # Errors
  ///
  /// Returns `Error::Config` when the HTTP client cannot be built or an
  /// API declares an invalid throttle quota.
  pub fn with_catalog(config: &Config, catalog: Catalog) -> Result<Self> {
    let transport = Arc::new(Transport::new(config)?);

    let mut throttlers = HashMap::new();
    for api in &catalog.apis {
      if let Some(quota) = api.rate_limit {
        let throttler = Throttler::new(quota.count, quota.period())
          .map_err(|e| Error::Config(format!("{}: {e}", api.name)))?;
        throttlers.insert(api.name.clone(), Arc::new(throttler));
      }
    }

    Ok(Self { transport, catalog, throttlers })
  }

  /// The catalog this client dispatches over.
  pub fn catalog(&self) -> &Catalog {
    &self.catalog
  }

  /// Documentation URL for an API. No network call.
  pub fn docs_url(&self, api: &str) -> Result<&str> {
    Ok(&self.catalog.api(api)?.docs_url)
  }

  /// Short description of an API. No network call.
  pub fn about(&self, api: &str) -> Result<&str> {
    Ok(&self.catalog.api(api)?.about)
  }

  /// Call a JSON endpoint by name.
  ///
  /// Waits on the API's throttler when it has one, however long that takes;
  /// use [`call_within`](Self::call_within) to bound the wait.
  #[instrument(skip(self, args), fields(api, endpoint))]
  pub async fn call(&self, api: &str, endpoint: &str, args: CallArgs) -> Result<Value> {
    let request = self.prepare(api, endpoint, args, ResponseKind::Json)?;
    if let Some(throttler) = self.throttlers.get(api) {
      throttler.acquire().await;
    }
    self.transport.execute(request.method, request.url, &request.headers, request.payload).await
  }

  /// Like [`call`](Self::call), but fails with `Error::RateLimit` instead
  /// of waiting past `budget` for a throttle slot.
  #[instrument(skip(self, args), fields(api, endpoint))]
  pub async fn call_within(
    &self,
    api: &str,
    endpoint: &str,
    args: CallArgs,
    budget: Duration,
  ) -> Result<Value> {
    let request = self.prepare(api, endpoint, args, ResponseKind::Json)?;
    if let Some(throttler) = self.throttlers.get(api) {
      throttler.acquire_within(budget).await?;
    }
    self.transport.execute(request.method, request.url, &request.headers, request.payload).await
  }

  /// Call an endpoint that returns raw content (images and the like).
  #[instrument(skip(self, args), fields(api, endpoint))]
  pub async fn fetch_bytes(&self, api: &str, endpoint: &str, args: CallArgs) -> Result<Bytes> {
    let request = self.prepare(api, endpoint, args, ResponseKind::Bytes)?;
    if let Some(throttler) = self.throttlers.get(api) {
      throttler.acquire().await;
    }
    self.transport.fetch_bytes(request.url, &request.headers).await
  }

  /// Resolve, validate and bind one call. Pure; performs no I/O.
  fn prepare(
    &self,
    api: &str,
    endpoint: &str,
    args: CallArgs,
    expected: ResponseKind,
  ) -> Result<PreparedRequest> {
    let api = self.catalog.api(api)?;
    let endpoint = api.endpoint(endpoint)?;

    if endpoint.response != expected {
      let hint = match endpoint.response {
        ResponseKind::Bytes => "returns raw content; use fetch_bytes",
        ResponseKind::Json => "returns JSON; use call",
      };
      return Err(Error::Validation(format!("{}/{} {hint}", api.name, endpoint.name)));
    }

    bind(api, endpoint, args)
  }
}

/// Characters that must be escaped inside a single path segment. Notably
/// `/`, `?` and `#`, which would otherwise restructure the URL.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
  .add(b' ')
  .add(b'"')
  .add(b'<')
  .add(b'>')
  .add(b'`')
  .add(b'#')
  .add(b'?')
  .add(b'{')
  .add(b'}')
  .add(b'/')
  .add(b'%');

/// Substitute path params, collect query and body params, and assemble the
/// final URL and payload.
fn bind(api: &ApiSpec, endpoint: &EndpointSpec, mut args: CallArgs) -> Result<PreparedRequest> {
  for name in args.keys() {
    if !endpoint.params.iter().any(|p| p.name == *name) {
      return Err(Error::Validation(format!(
        "unknown argument `{name}` for {}/{}",
        api.name, endpoint.name
      )));
    }
  }

  let mut path = endpoint.path.clone();
  let mut query: Vec<(String, String)> = Vec::new();
  let mut json_body = serde_json::Map::new();
  let mut form_body: Vec<(String, String)> = Vec::new();

  for param in &endpoint.params {
    let value = args.remove(&param.name).or_else(|| param.default.clone());
    let Some(value) = value else {
      if param.required {
        return Err(Error::Validation(format!(
          "missing required argument `{}` for {}/{}",
          param.name, api.name, endpoint.name
        )));
      }
      continue;
    };

    check_bounds(param, &value)?;

    match param.location {
      ParamLocation::Path => {
        let placeholder = format!("{{{}}}", param.name);
        if !path.contains(&placeholder) {
          return Err(Error::Config(format!(
            "{}/{}: path template has no `{placeholder}` placeholder",
            api.name, endpoint.name
          )));
        }
        let segment = scalar(param, &value)?;
        path = path.replace(&placeholder, &utf8_percent_encode(&segment, PATH_SEGMENT).to_string());
      }
      ParamLocation::Query => {
        query.push((param.name.clone(), scalar(param, &value)?));
      }
      ParamLocation::Body => match endpoint.method {
        EndpointMethod::PostJson => {
          json_body.insert(param.name.clone(), value);
        }
        EndpointMethod::PostForm => {
          form_body.push((param.name.clone(), form_field(&value)?));
        }
        EndpointMethod::Get => {
          return Err(Error::Config(format!(
            "{}/{}: body parameter `{}` on a GET endpoint",
            api.name, endpoint.name, param.name
          )));
        }
      },
    }
  }

  if path.contains('{') {
    return Err(Error::Validation(format!(
      "{}/{}: unfilled placeholder in path `{path}`",
      api.name, endpoint.name
    )));
  }

  // A few endpoints live on a separate host (image servers); an absolute
  // template bypasses the base URL.
  let full = if path.starts_with("http://") || path.starts_with("https://") {
    path
  } else {
    format!("{}{path}", api.base_url)
  };
  let mut url = Url::parse(&full)
    .map_err(|e| Error::Config(format!("{}/{}: invalid URL `{full}`: {e}", api.name, endpoint.name)))?;

  if !query.is_empty() {
    url.query_pairs_mut().extend_pairs(query);
  }

  let (method, payload) = match endpoint.method {
    EndpointMethod::Get => (HttpMethod::Get, Payload::None),
    EndpointMethod::PostJson => (HttpMethod::Post, Payload::Json(Value::Object(json_body))),
    EndpointMethod::PostForm => (HttpMethod::Post, Payload::Form(form_body)),
  };

  let headers =
    api.headers.iter().map(|h| (h.name.clone(), h.value.clone())).collect();

  Ok(PreparedRequest { method, url, headers, payload })
}

/// Length and range preconditions, checked before any I/O.
fn check_bounds(param: &crate::catalog::ParamSpec, value: &Value) -> Result<()> {
  if let Value::String(s) = value {
    let len = s.chars().count();
    if let Some(min) = param.min_len {
      if len < min {
        return Err(Error::Validation(format!(
          "`{}` must be at least {min} characters (got {len})",
          param.name
        )));
      }
    }
    if let Some(max) = param.max_len {
      if len > max {
        return Err(Error::Validation(format!(
          "`{}` must be at most {max} characters (got {len})",
          param.name
        )));
      }
    }
  }

  if let Value::Number(n) = value {
    let n = n.as_f64().unwrap_or(f64::NAN);
    if let Some(min) = param.min {
      if n < min as f64 {
        return Err(Error::Validation(format!("`{}` must be >= {min}", param.name)));
      }
    }
    if let Some(max) = param.max {
      if n > max as f64 {
        return Err(Error::Validation(format!("`{}` must be <= {max}", param.name)));
      }
    }
  }

  Ok(())
}

/// Stringify a scalar for a path segment or query pair. Arrays and objects
/// only ever belong in bodies.
fn scalar(param: &crate::catalog::ParamSpec, value: &Value) -> Result<String> {
  match value {
    Value::String(s) => Ok(s.clone()),
    Value::Number(n) => Ok(n.to_string()),
    Value::Bool(b) => Ok(b.to_string()),
    _ => Err(Error::Validation(format!(
      "`{}` must be a string, number or bool, not an array or object",
      param.name
    ))),
  }
}

/// Form fields take scalars verbatim; structured values are sent as their
/// JSON encoding.
fn form_field(value: &Value) -> Result<String> {
  match value {
    Value::String(s) => Ok(s.clone()),
    Value::Number(n) => Ok(n.to_string()),
    Value::Bool(b) => Ok(b.to_string()),
    other => Ok(serde_json::to_string(other)?),
  }
}
