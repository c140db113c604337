use super::transport::{RawResponse, Transport, TransportError, UpstreamRequest};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Canned provider used by the fetcher and route tests. Counts every call.
pub struct MockTransport {
    status: u16,
    body: String,
    delay: Option<Duration>,
    fail_with_timeout: bool,
    calls: AtomicUsize,
    last_url: Mutex<Option<String>>,
}

impl MockTransport {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
            fail_with_timeout: false,
            calls: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        }
    }

    /// Behaves like a resilience layer whose overall deadline expired.
    pub fn timing_out() -> Self {
        let mut transport = Self::with_status(200, "{}");
        transport.fail_with_timeout = true;
        transport
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(request.url.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_with_timeout {
            return Err(TransportError::TimedOut(Duration::from_secs(5)));
        }

        Ok(RawResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

/// Provider payload for `city` with `days` forecast days and `hours` entries
/// in the first day's hour list.
pub fn forecast_payload(city: &str, days: usize, hours: usize) -> String {
    let forecastday: Vec<Value> = (0..days)
        .map(|day| {
            let date = format!("2025-10-{:02}", 25 + day);
            let hour: Vec<Value> = if day == 0 {
                (0..hours)
                    .map(|h| {
                        json!({
                            "time": format!("{} {:02}:00", date, h),
                            "temp_c": 10.0 + h as f64 * 0.5,
                            "condition": { "text": "Clear", "icon": "//cdn.weatherapi.com/night/113.png" }
                        })
                    })
                    .collect()
            } else {
                Vec::new()
            };

            json!({
                "date": date,
                "day": {
                    "avgtemp_c": 15.0 + day as f64,
                    "condition": { "text": "Partly cloudy", "icon": "//cdn.weatherapi.com/day/116.png" }
                },
                "hour": hour
            })
        })
        .collect();

    json!({
        "location": { "name": city, "country": "Somewhere" },
        "current": {
            "temp_c": 20.0,
            "humidity": 65,
            "wind_kph": 10.4,
            "condition": { "text": "Cloudy", "icon": "//cdn.weatherapi.com/day/119.png" }
        },
        "forecast": { "forecastday": forecastday }
    })
    .to_string()
}

/// Payload with only location and current conditions, no forecast section.
pub fn current_only_payload(city: &str) -> String {
    json!({
        "location": { "name": city },
        "current": {
            "temp_c": 22,
            "humidity": 50,
            "wind_kph": 15,
            "condition": { "text": "Sunny", "icon": "icon.png" }
        }
    })
    .to_string()
}
