//! HTTP transport layer: one request out, one classified outcome back.
//!
//! Every failure mode is folded into `nokey_core::Error` at this boundary;
//! callers never handle `reqwest` errors directly. Exactly one attempt is
//! made per call. Retrying is deliberately left to the caller.

use bytes::Bytes;
use moka::future::Cache;
use nokey_core::{Config, Error, HttpMethod, Result};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Body shape for a single outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
  None,
  /// POST with a JSON-encoded body (`Content-Type: application/json`)
  Json(Value),
  /// POST with an `application/x-www-form-urlencoded` body
  Form(Vec<(String, String)>),
}

/// HTTP transport with an optional process-wide GET response cache.
///
/// The cache is an external collaborator (moka); this type only installs it
/// when configured and keys entries by full request URL with a fixed TTL.
pub struct Transport {
  client: Client,
  cache: Option<Cache<String, Value>>,
}

impl std::fmt::Debug for Transport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Transport").field("cache_enabled", &self.cache.is_some()).finish()
  }
}

impl Transport {
  /// Create a new transport instance
  pub fn new(config: &Config) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(config.user_agent.clone())
      .build()
      .map_err(|e| Error::Transport(format!("failed to create HTTP client: {e}")))?;

    let cache = if config.cache.enabled {
      debug!(
        name = %config.cache.name,
        max_entries = config.cache.max_entries,
        ttl_secs = config.cache.ttl_secs,
        "installing response cache"
      );
      Some(
        Cache::builder()
          .max_capacity(config.cache.max_entries)
          .time_to_live(Duration::from_secs(config.cache.ttl_secs))
          .build(),
      )
    } else {
      None
    };

    Ok(Self { client, cache })
  }

  /// Perform exactly one HTTP request and decode the response as JSON.
  ///
  /// 2xx responses decode to their JSON payload; an empty 2xx body decodes
  /// to `Value::Null` (some upstream APIs answer yes/no questions with bare
  /// 200/204 responses). Non-2xx responses become `Error::Http`, carrying
  /// the server's `"message"` field when the error body is JSON. Timeouts
  /// and connection failures become `Error::Timeout` / `Error::Transport`.
  #[instrument(skip(self, headers, payload), fields(method = %method, url = %url))]
  pub async fn execute(
    &self,
    method: HttpMethod,
    url: Url,
    headers: &[(String, String)],
    payload: Payload,
  ) -> Result<Value> {
    let cacheable = method == HttpMethod::Get && payload == Payload::None;

    if cacheable {
      if let Some(cache) = &self.cache {
        if let Some(hit) = cache.get(url.as_str()).await {
          debug!("response cache hit");
          return Ok(hit);
        }
      }
    }

    let mut request = match (method, payload) {
      (HttpMethod::Get, Payload::None) => self.client.get(url.clone()),
      (HttpMethod::Get, _) => {
        return Err(Error::Validation("GET requests cannot carry a body".to_string()));
      }
      (HttpMethod::Post, Payload::Json(body)) => self.client.post(url.clone()).json(&body),
      (HttpMethod::Post, Payload::Form(fields)) => self.client.post(url.clone()).form(&fields),
      (HttpMethod::Post, Payload::None) => self.client.post(url.clone()),
    };
    for (name, value) in headers {
      request = request.header(name.as_str(), value.as_str());
    }

    let response = request.send().await.map_err(classify)?;
    let status = response.status();

    if !status.is_success() {
      return Err(http_failure(response).await);
    }

    let body = response.text().await.map_err(classify)?;
    debug!(bytes = body.len(), "response body received");

    let value = if body.trim().is_empty() {
      Value::Null
    } else {
      serde_json::from_str(&body)
        .map_err(|e| Error::Unexpected(format!("failed to decode response as JSON: {e}")))?
    };

    if cacheable {
      if let Some(cache) = &self.cache {
        cache.insert(url.as_str().to_string(), value.clone()).await;
      }
    }

    Ok(value)
  }

  /// GET an endpoint that returns raw content (images and other non-JSON
  /// bodies). Never cached.
  #[instrument(skip(self, headers), fields(url = %url))]
  pub async fn fetch_bytes(&self, url: Url, headers: &[(String, String)]) -> Result<Bytes> {
    let mut request = self.client.get(url);
    for (name, value) in headers {
      request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().await.map_err(classify)?;
    let status = response.status();

    if !status.is_success() {
      return Err(http_failure(response).await);
    }

    let body = response.bytes().await.map_err(classify)?;
    debug!(bytes = body.len(), "raw body received");
    Ok(body)
  }
}

/// Map a reqwest failure onto the error taxonomy.
fn classify(e: reqwest::Error) -> Error {
  if e.is_timeout() {
    Error::Timeout
  } else {
    Error::Transport(e.to_string())
  }
}

/// Build an `Error::Http` from a non-2xx response, pulling the server's
/// `"message"` out of a JSON error body when there is one.
async fn http_failure(response: Response) -> Error {
  let status = response.status();
  let reason = status.canonical_reason().unwrap_or("Unknown Status").to_string();

  let server_message = response
    .text()
    .await
    .ok()
    .and_then(|body| serde_json::from_str::<Value>(&body).ok())
    .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));

  Error::Http { status: status.as_u16(), reason, server_message }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_string_contains, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn transport() -> Transport {
    Transport::new(&Config::default_config()).unwrap()
  }

  fn caching_transport() -> Transport {
    Transport::new(&Config::default_config().with_caching()).unwrap()
  }

  async fn url_of(server: &MockServer, p: &str) -> Url {
    Url::parse(&format!("{}{p}", server.uri())).unwrap()
  }

  #[tokio::test]
  async fn test_success_returns_decoded_body() {
    let server = MockServer::start().await;
    let body = json!({"breeds": ["akita", "beagle"], "status": "success"});
    Mock::given(method("GET"))
      .and(path("/breeds/list/all"))
      .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
      .mount(&server)
      .await;

    let url = url_of(&server, "/breeds/list/all").await;
    let value = transport().execute(HttpMethod::Get, url, &[], Payload::None).await.unwrap();
    assert_eq!(value, body);
  }

  #[tokio::test]
  async fn test_http_error_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/missing"))
      .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
      .mount(&server)
      .await;

    let url = url_of(&server, "/missing").await;
    let err = transport().execute(HttpMethod::Get, url, &[], Payload::None).await.unwrap_err();

    match err {
      Error::Http { status, server_message, .. } => {
        assert_eq!(status, 404);
        assert_eq!(server_message.as_deref(), Some("not found"));
      }
      other => panic!("expected Http error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_http_error_without_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/teapot"))
      .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
      .mount(&server)
      .await;

    let url = url_of(&server, "/teapot").await;
    let err = transport().execute(HttpMethod::Get, url, &[], Payload::None).await.unwrap_err();

    match err {
      Error::Http { status, server_message, .. } => {
        assert_eq!(status, 500);
        assert!(server_message.is_none());
      }
      other => panic!("expected Http error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_classification_is_stable_across_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/missing"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;

    let t = transport();
    let url = url_of(&server, "/missing").await;
    for _ in 0..3 {
      let err = t.execute(HttpMethod::Get, url.clone(), &[], Payload::None).await.unwrap_err();
      assert!(matches!(err, Error::Http { status: 404, .. }));
    }
  }

  #[tokio::test]
  async fn test_empty_success_body_decodes_to_null() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/IsTodayPublicHoliday/US"))
      .respond_with(ResponseTemplate::new(204))
      .mount(&server)
      .await;

    let url = url_of(&server, "/IsTodayPublicHoliday/US").await;
    let value = transport().execute(HttpMethod::Get, url, &[], Payload::None).await.unwrap();
    assert_eq!(value, Value::Null);
  }

  #[tokio::test]
  async fn test_undecodable_success_body_is_unexpected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/html"))
      .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
      .mount(&server)
      .await;

    let url = url_of(&server, "/html").await;
    let err = transport().execute(HttpMethod::Get, url, &[], Payload::None).await.unwrap_err();
    assert!(matches!(err, Error::Unexpected(_)));
  }

  #[tokio::test]
  async fn test_timeout_maps_to_timeout_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
      .mount(&server)
      .await;

    let mut config = Config::default_config();
    config.timeout_secs = 1;
    let t = Transport::new(&config).unwrap();

    let url = url_of(&server, "/slow").await;
    let err = t.execute(HttpMethod::Get, url.clone(), &[], Payload::None).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));

    // Same classification for a POST
    let err =
      t.execute(HttpMethod::Post, url, &[], Payload::Json(json!({"task": []}))).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
  }

  #[tokio::test]
  async fn test_connection_failure_maps_to_transport_error() {
    // Nothing listens here
    let url = Url::parse("http://127.0.0.1:1/unreachable").unwrap();
    let err = transport().execute(HttpMethod::Get, url, &[], Payload::None).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
  }

  #[tokio::test]
  async fn test_post_json_sends_json_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/sudoku/verifier"))
      .and(header("content-type", "application/json"))
      .and(body_string_contains("task"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isCorrect": true})))
      .expect(1)
      .mount(&server)
      .await;

    let url = url_of(&server, "/sudoku/verifier").await;
    let value = transport()
      .execute(HttpMethod::Post, url, &[], Payload::Json(json!({"task": [[1, 2], [2, 1]]})))
      .await
      .unwrap();
    assert_eq!(value["isCorrect"], json!(true));
  }

  #[tokio::test]
  async fn test_post_form_sends_urlencoded_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/autocomplete/accounts/aid"))
      .and(header("content-type", "application/x-www-form-urlencoded"))
      .and(body_string_contains("limit=10"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
      .expect(1)
      .mount(&server)
      .await;

    let url = url_of(&server, "/autocomplete/accounts/aid").await;
    let fields = vec![("limit".to_string(), "10".to_string())];
    transport().execute(HttpMethod::Post, url, &[], Payload::Form(fields)).await.unwrap();
  }

  #[tokio::test]
  async fn test_static_headers_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/2.1/nobelPrizes"))
      .and(header("accept", "application/json"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nobelPrizes": []})))
      .expect(1)
      .mount(&server)
      .await;

    let url = url_of(&server, "/2.1/nobelPrizes").await;
    let headers = vec![("Accept".to_string(), "application/json".to_string())];
    transport().execute(HttpMethod::Get, url, &headers, Payload::None).await.unwrap();
  }

  #[tokio::test]
  async fn test_get_with_body_is_rejected() {
    let url = Url::parse("https://example.com/x").unwrap();
    let err =
      transport().execute(HttpMethod::Get, url, &[], Payload::Json(json!({}))).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[tokio::test]
  async fn test_cache_serves_repeat_get_without_upstream_hit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/activity"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"activity": "read a book"})))
      .expect(1)
      .mount(&server)
      .await;

    let t = caching_transport();
    let url = url_of(&server, "/activity").await;

    let first = t.execute(HttpMethod::Get, url.clone(), &[], Payload::None).await.unwrap();
    let second = t.execute(HttpMethod::Get, url, &[], Payload::None).await.unwrap();
    assert_eq!(first, second);

    server.verify().await;
  }

  #[tokio::test]
  async fn test_fetch_bytes_returns_raw_body() {
    let server = MockServer::start().await;
    let png_ish = vec![0x89u8, 0x50, 0x4e, 0x47, 0x0d, 0x0a];
    Mock::given(method("GET"))
      .and(path("/image.jpg"))
      .respond_with(ResponseTemplate::new(200).set_body_bytes(png_ish.clone()))
      .mount(&server)
      .await;

    let url = url_of(&server, "/image.jpg").await;
    let body = transport().fetch_bytes(url, &[]).await.unwrap();
    assert_eq!(body.as_ref(), png_ish.as_slice());
  }

  #[tokio::test]
  async fn test_fetch_bytes_classifies_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(403))
      .mount(&server)
      .await;

    let url = url_of(&server, "/image.jpg").await;
    let err = transport().fetch_bytes(url, &[]).await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 403, .. }));
  }
}
