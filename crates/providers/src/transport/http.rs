//! Retrying HTTP transport used by the providers.

use crate::config::{AuthScheme, TransportConfig};
use crate::error::{TransportError, TransportResult};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// HTTP transport for calling a provider's backing API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: Arc<TransportConfig>,
}

impl HttpTransport {
    pub fn new(config: Arc<TransportConfig>) -> TransportResult<Self> {
        let mut headers = header::HeaderMap::new();

        if let Some(ref api_key) = config.api_key {
            let value = match config.auth_scheme {
                AuthScheme::Raw => api_key.clone(),
                AuthScheme::Bearer => format!("Bearer {}", api_key),
            };
            let mut value = header::HeaderValue::from_str(&value)
                .map_err(|_| TransportError::Config("Invalid API key format".to_string()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Append `path` to the base URL, keeping any path the base already has.
    fn build_url(&self, path: &str) -> TransportResult<url::Url> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(url::Url::parse(&format!("{}/{}", base, path))?)
    }

    /// Execute a request, retrying transient failures with backoff.
    ///
    /// Status codes are retried per the [`RetryConfig`](crate::config::RetryConfig);
    /// other failures when [`TransportError::is_retryable`] says so.
    async fn execute_with_retry(&self, request_builder: RequestBuilder) -> TransportResult<Response> {
        let retry_config = &self.config.retry_config;
        let mut attempt = 1;

        loop {
            let request = request_builder
                .try_clone()
                .ok_or_else(|| TransportError::Config("Request cannot be cloned".to_string()))?;

            let error = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    TransportError::from_response(status, &body)
                }
                Err(e) => TransportError::from(e),
            };

            let retryable = match &error {
                TransportError::Api { status, .. } => retry_config.should_retry_status(*status),
                other => other.is_retryable(),
            };
            if !retryable || attempt >= retry_config.max_attempts() {
                return Err(error);
            }

            let backoff = retry_config.backoff_for_attempt(attempt - 1);
            warn!(
                error = %error,
                attempt = attempt,
                backoff_ms = backoff.as_millis(),
                "Request failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> TransportResult<T> {
        let url = self.build_url(path)?;
        debug!(url = %url, "GET request");

        let response = self.execute_with_retry(self.client.get(url)).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> TransportResult<T> {
        let url = self.build_url(path)?;
        debug!(url = %url, "POST request");

        let response = self
            .execute_with_retry(self.client.post(url).json(body))
            .await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Single GET without retries; true on a 2xx answer.
    pub async fn probe(&self, path: &str) -> TransportResult<bool> {
        let url = self.build_url(path)?;
        debug!(url = %url, "Probe request");

        let response = self.client.get(url).send().await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestResponse {
        message: String,
        value: i32,
    }

    fn create_config(base_url: &str) -> Arc<TransportConfig> {
        Arc::new(TransportConfig {
            base_url: url::Url::parse(base_url).unwrap(),
            api_key: None,
            auth_scheme: AuthScheme::Bearer,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::no_retry(),
        })
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/items/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "success".to_string(),
                value: 42,
            }))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();

        let result: TestResponse = transport.get("/items/1").await.unwrap();
        assert_eq!(result.value, 42);
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/3/action/package_search"))
            .and(body_json(serde_json::json!({"q": "parks", "rows": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "found".to_string(),
                value: 5,
            }))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();

        let result: TestResponse = transport
            .post(
                "/api/3/action/package_search",
                &serde_json::json!({"q": "parks", "rows": 5}),
            )
            .await
            .unwrap();
        assert_eq!(result.message, "found");
    }

    #[tokio::test]
    async fn test_raw_authorization_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/protected"))
            .and(header("Authorization", "ckan-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "authorized".to_string(),
                value: 1,
            }))
            .mount(&server)
            .await;

        let config = TransportConfig {
            api_key: Some("ckan-key".to_string()),
            auth_scheme: AuthScheme::Raw,
            ..(*create_config(&server.uri())).clone()
        };
        let transport = HttpTransport::new(Arc::new(config)).unwrap();

        let result: TestResponse = transport.get("/protected").await.unwrap();
        assert_eq!(result.message, "authorized");
    }

    #[tokio::test]
    async fn test_bearer_authorization_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/protected"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "authorized".to_string(),
                value: 1,
            }))
            .mount(&server)
            .await;

        let config = TransportConfig {
            api_key: Some("sk-test".to_string()),
            ..(*create_config(&server.uri())).clone()
        };
        let transport = HttpTransport::new(Arc::new(config)).unwrap();

        let result: TestResponse = transport.get("/protected").await.unwrap();
        assert_eq!(result.value, 1);
    }

    #[tokio::test]
    async fn test_error_on_400_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/bad"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "Bad Request"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = TransportConfig {
            retry_config: fast_retry(2),
            ..(*create_config(&server.uri())).clone()
        };
        let transport = HttpTransport::new(Arc::new(config)).unwrap();

        let result: TransportResult<TestResponse> = transport.get("/bad").await;
        match result {
            Err(TransportError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad Request");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "recovered".to_string(),
                value: 3,
            }))
            .mount(&server)
            .await;

        let config = TransportConfig {
            retry_config: fast_retry(2),
            ..(*create_config(&server.uri())).clone()
        };
        let transport = HttpTransport::new(Arc::new(config)).unwrap();

        let result: TestResponse = transport.get("/flaky").await.unwrap();
        assert_eq!(result.message, "recovered");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let config = TransportConfig {
            retry_config: fast_retry(2),
            ..(*create_config(&server.uri())).clone()
        };
        let transport = HttpTransport::new(Arc::new(config)).unwrap();

        let err = transport.get::<TestResponse>("/down").await.unwrap_err();
        assert!(matches!(err, TransportError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_connect_failure_retried_then_reported() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let config = TransportConfig {
            retry_config: fast_retry(1),
            ..(*create_config(&uri)).clone()
        };
        let transport = HttpTransport::new(Arc::new(config)).unwrap();

        let err = transport.get::<TestResponse>("/gone").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, TransportError::Http(ref e) if e.is_connect()));
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let err = transport.get::<TestResponse>("/html").await.unwrap_err();
        assert!(matches!(err, TransportError::Json(_)));
    }

    #[tokio::test]
    async fn test_probe() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        assert!(transport.probe("/health").await.unwrap());
        assert!(!transport.probe("/missing").await.unwrap());
    }

    #[test]
    fn test_build_url_keeps_base_path() {
        let transport =
            HttpTransport::new(create_config("https://data.example.com/ckan/")).unwrap();

        let url = transport.build_url("/api/3/action/status_show").unwrap();
        assert_eq!(
            url.as_str(),
            "https://data.example.com/ckan/api/3/action/status_show"
        );
    }

    #[test]
    fn test_build_url_without_base_path() {
        let transport = HttpTransport::new(create_config("http://localhost:8080")).unwrap();

        let url = transport.build_url("items/7").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/items/7");
    }
}
