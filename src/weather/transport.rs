use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};

use crate::config::Config;
use crate::utils::truncate_body;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Request timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Request was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub url: String,
}

impl UpstreamRequest {
    pub fn forecast(base_url: &str, api_key: &str, city: &str, days: u32) -> Self {
        Self {
            url: format!(
                "{}?key={}&q={}&days={}&aqi=no&alerts=no",
                base_url,
                urlencoding::encode(api_key),
                urlencoding::encode(city),
                days
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound channel to the weather provider. Implementations own the retry
/// and timeout policy; callers treat every `Err` as final.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError>;
}

pub struct HttpTransport {
    client: Client,
    attempt_timeout: Duration,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        Self::with_policy(
            Duration::from_secs(config.request_timeout_secs),
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
        )
    }

    pub fn with_policy(
        attempt_timeout: Duration,
        max_retries: u32,
        base_delay: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent("WeatherDashboard/1.0")
            .build()?;

        Ok(Self {
            client,
            attempt_timeout,
            max_retries,
            base_delay,
        })
    }

    async fn send_once(&self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// 408, 429 and 5xx are worth another attempt; other statuses are final.
fn is_transient(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError> {
        let mut retry_count = 0;
        let mut delay = self.base_delay;

        loop {
            // Timeouts end the call outright, only failed attempts are retried.
            let outcome = timeout(self.attempt_timeout, self.send_once(&request.url))
                .await
                .map_err(|_| TransportError::TimedOut(self.attempt_timeout))?;

            let exhausted = retry_count >= self.max_retries;
            match outcome {
                Ok(response) if exhausted || !is_transient(response.status) => return Ok(response),
                Err(e) if exhausted => return Err(e),
                Ok(response) => {
                    tracing::warn!(
                        status = response.status,
                        attempt = retry_count + 1,
                        "Weather provider returned {}, retrying in {}ms: {}",
                        response.status,
                        delay.as_millis(),
                        truncate_body(&response.body)
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = retry_count + 1,
                        "Weather provider request failed, retrying in {}ms: {}",
                        delay.as_millis(),
                        e
                    );
                }
            }

            sleep(with_jitter(delay)).await;
            delay = delay.saturating_mul(2);
            retry_count += 1;
        }
    }
}

fn with_jitter(delay: Duration) -> Duration {
    let max_jitter = (delay.as_millis() / 10) as u64;
    delay + Duration::from_millis(fastrand::u64(0..=max_jitter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_transport(max_retries: u32) -> HttpTransport {
        HttpTransport::with_policy(Duration::from_secs(5), max_retries, Duration::from_millis(10))
            .unwrap()
    }

    fn request_for(server: &MockServer, city: &str) -> UpstreamRequest {
        UpstreamRequest::forecast(
            &format!("{}/v1/forecast.json", server.uri()),
            "fake-key",
            city,
            1,
        )
    }

    #[test]
    fn test_forecast_request_url() {
        let request =
            UpstreamRequest::forecast("http://api.test/v1/forecast.json", "k", "New York", 3);
        assert_eq!(
            request.url,
            "http://api.test/v1/forecast.json?key=k&q=New%20York&days=3&aqi=no&alerts=no"
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(is_transient(500));
        assert!(is_transient(503));
        assert!(is_transient(408));
        assert!(is_transient(429));
        assert!(!is_transient(400));
        assert!(!is_transient(404));
        assert!(!is_transient(200));
    }

    #[tokio::test]
    async fn test_send_passes_query_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast.json"))
            .and(query_param("q", "Paris"))
            .and(query_param("days", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let response = fast_transport(2).send(&request_for(&server, "Paris")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{}");
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_send_retries_server_errors() {
        let server = MockServer::start().await;

        // First two requests fail, third succeeds
        Mock::given(method("GET"))
            .and(path("/v1/forecast.json"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let response = fast_transport(2).send(&request_for(&server, "Paris")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "ok");
    }

    #[tokio::test]
    async fn test_send_returns_last_response_when_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast.json"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let response = fast_transport(2).send(&request_for(&server, "Paris")).await.unwrap();
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_send_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast.json"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error":{"message":"No matching location found."}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = fast_transport(2).send(&request_for(&server, "Nowhere")).await.unwrap();
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_send_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast.json"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let transport =
            HttpTransport::with_policy(Duration::from_millis(200), 2, Duration::from_millis(10))
                .unwrap();
        let result = transport.send(&request_for(&server, "Paris")).await;
        assert!(matches!(result, Err(TransportError::TimedOut(_))));
    }
}
