//! Cache-aside lookup of weather snapshots.
//!
//! `fetch` never fails loudly: transport problems, provider errors, fuzzy
//! location matches and malformed payloads all end up as `None`, logged with
//! the requested city. Concurrent misses on the same key are not coalesced,
//! each caller goes upstream on its own.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::transport::{Transport, TransportError, UpstreamRequest};
use super::types::*;
use crate::cache::{CachePriority, CacheStore, CachedValue, ExpirationPolicy};
use crate::config::Config;
use crate::utils::{absolute_icon_url, fold_keys, same_city, time_of_day, truncate_body, weather_cache_key};

/// Idle window applied on top of the configured absolute TTL.
pub const SLIDING_EXPIRATION: Duration = Duration::from_secs(2 * 60);

const HOURLY_POINTS: usize = 12;

#[derive(Error, Debug)]
enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("provider returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
    #[error("provider reported an error: {0}")]
    ProviderError(String),
    #[error("requested '{requested}' but provider resolved '{resolved}'")]
    FuzzyMatch { requested: String, resolved: String },
    #[error("malformed provider response: {0}")]
    Malformed(&'static str),
    #[error("unexpected provider payload: {0}")]
    Unexpected(#[from] serde_json::Error),
}

impl FetchError {
    fn log(&self, city: &str) {
        match self {
            FetchError::Unexpected(e) => {
                tracing::error!(city, error = %e, "Unexpected error fetching weather");
            }
            FetchError::FuzzyMatch { resolved, .. } => {
                tracing::warn!(city, resolved = %resolved, "Rejected fuzzy location match");
            }
            FetchError::Transport(TransportError::TimedOut(after)) => {
                tracing::warn!(city, "Weather provider timed out after {:?}", after);
            }
            other => {
                tracing::warn!(city, "Weather lookup failed: {}", other);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub api_base_url: String,
    pub api_key: String,
    pub cache_ttl: Duration,
}

impl FetcherSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_base_url: config.weather_api_base_url.clone(),
            api_key: config.weather_api_key.clone(),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
        }
    }
}

pub struct SnapshotFetcher {
    cache: CacheStore,
    transport: Arc<dyn Transport>,
    settings: FetcherSettings,
}

impl SnapshotFetcher {
    pub fn new(cache: CacheStore, transport: Arc<dyn Transport>, settings: FetcherSettings) -> Self {
        Self {
            cache,
            transport,
            settings,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Resolve `city` to a snapshot with `days` forecast days requested
    /// upstream. `cancel` only interrupts the network call itself.
    pub async fn fetch(
        &self,
        city: &str,
        days: u32,
        cancel: &CancellationToken,
    ) -> Option<Arc<WeatherSnapshot>> {
        let key = weather_cache_key(city, days);
        if let Some(snapshot) = self.cache.get_snapshot(&key).await {
            tracing::debug!(city, days, "Weather cache hit");
            return Some(snapshot);
        }

        match self.fetch_from_provider(city, days, cancel).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.cache
                    .set(key, CachedValue::Snapshot(snapshot.clone()), self.snapshot_policy())
                    .await;
                Some(snapshot)
            }
            Err(e) => {
                e.log(city);
                None
            }
        }
    }

    fn snapshot_policy(&self) -> ExpirationPolicy {
        ExpirationPolicy::absolute(self.settings.cache_ttl)
            .with_sliding(SLIDING_EXPIRATION)
            .with_priority(CachePriority::Normal)
    }

    async fn fetch_from_provider(
        &self,
        city: &str,
        days: u32,
        cancel: &CancellationToken,
    ) -> Result<WeatherSnapshot, FetchError> {
        let request = UpstreamRequest::forecast(
            &self.settings.api_base_url,
            &self.settings.api_key,
            city,
            days,
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            result = self.transport.send(&request) => result?,
        };

        if !response.is_success() {
            return Err(FetchError::UpstreamStatus {
                status: response.status,
                body: truncate_body(&response.body),
            });
        }

        parse_snapshot(city, &response.body)
    }
}

fn parse_snapshot(city: &str, body: &str) -> Result<WeatherSnapshot, FetchError> {
    let root: Value = serde_json::from_str(body)?;

    if let Some(error) = root.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .unwrap_or("unknown error");
        return Err(FetchError::ProviderError(message.to_string()));
    }

    let resolved = root
        .get("location")
        .and_then(|location| location.get("name"))
        .and_then(Value::as_str)
        .ok_or(FetchError::Malformed("location name is missing"))?;
    if !same_city(city, resolved) {
        return Err(FetchError::FuzzyMatch {
            requested: city.to_string(),
            resolved: resolved.to_string(),
        });
    }

    if !root.is_object() || root.get("location").is_none() || root.get("current").is_none() {
        return Err(FetchError::Malformed("location or current section is missing"));
    }

    let response: ForecastApiResponse = serde_json::from_value(fold_keys(root))?;
    let (Some(location), Some(current)) = (response.location, response.current) else {
        return Err(FetchError::Malformed("location or current section is empty"));
    };

    Ok(build_snapshot(location, current, response.forecast))
}

fn build_snapshot(
    location: ApiLocation,
    current: ApiCurrent,
    forecast: Option<ApiForecast>,
) -> WeatherSnapshot {
    let days = forecast.map(|f| f.forecastday).unwrap_or_default();

    let hourly = days
        .first()
        .map(|today| {
            today
                .hour
                .iter()
                .take(HOURLY_POINTS)
                .map(|hour| HourlyPoint {
                    time_of_day: hour.time.as_deref().map(time_of_day).unwrap_or_default(),
                    temperature: hour.temp_c,
                    icon_url: absolute_icon_url(ApiCondition::icon_or_empty(hour.condition.as_ref())),
                })
                .collect()
        })
        .unwrap_or_default();

    let forecast = days
        .iter()
        .skip(1)
        .map(|day| {
            let condition = day.day.as_ref().and_then(|d| d.condition.as_ref());
            ForecastDay {
                date: day.date.clone().unwrap_or_default(),
                average_temp: day.day.as_ref().map(|d| d.avgtemp_c).unwrap_or_default(),
                description: ApiCondition::text_or_empty(condition),
                icon_url: absolute_icon_url(ApiCondition::icon_or_empty(condition)),
            }
        })
        .collect();

    let condition = current.condition.as_ref();
    WeatherSnapshot {
        city: location.name.unwrap_or_default(),
        temperature: current.temp_c,
        description: ApiCondition::text_or_empty(condition),
        humidity: current.humidity,
        wind_speed_kph: current.wind_kph,
        icon_url: absolute_icon_url(ApiCondition::icon_or_empty(condition)),
        forecast,
        hourly,
    }
}
