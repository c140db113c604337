use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::weather::{
    types::{ForecastDay, HourlyPoint, WeatherSnapshot},
    DefaultCityPointer, SnapshotFetcher,
};

const DEFAULT_FORECAST_DAYS: u32 = 5;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<SnapshotFetcher>,
    pub default_city: Arc<DefaultCityPointer>,
}

impl AppState {
    pub fn new(fetcher: Arc<SnapshotFetcher>) -> Self {
        let default_city = Arc::new(DefaultCityPointer::new(fetcher.clone()));
        Self {
            fetcher,
            default_city,
        }
    }
}

// Request/Response types
#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DefaultCityRequest {
    #[serde(default, alias = "City")]
    pub city: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DefaultCitySetResponse {
    pub city: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DefaultCityResponse {
    pub city: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherResponse {
    pub city: String,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
    pub forecast: Vec<ForecastEntry>,
    pub hourly: Vec<HourlyEntry>,
}

#[derive(Debug, Serialize)]
pub struct ForecastEntry {
    pub date: String,
    pub temp: f64,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Serialize)]
pub struct HourlyEntry {
    pub time: String,
    pub temp: f64,
    pub icon: String,
}

impl From<&ForecastDay> for ForecastEntry {
    fn from(day: &ForecastDay) -> Self {
        Self {
            date: day.date.clone(),
            temp: day.average_temp,
            description: day.description.clone(),
            icon: day.icon_url.clone(),
        }
    }
}

impl From<&HourlyPoint> for HourlyEntry {
    fn from(point: &HourlyPoint) -> Self {
        Self {
            time: point.time_of_day.clone(),
            temp: point.temperature,
            icon: point.icon_url.clone(),
        }
    }
}

impl From<&WeatherSnapshot> for WeatherResponse {
    fn from(snapshot: &WeatherSnapshot) -> Self {
        Self {
            city: snapshot.city.clone(),
            temperature: snapshot.temperature,
            humidity: snapshot.humidity,
            wind_speed: snapshot.wind_speed_kph,
            description: snapshot.description.clone(),
            icon: snapshot.icon_url.clone(),
            forecast: snapshot.forecast.iter().map(ForecastEntry::from).collect(),
            hourly: snapshot.hourly.iter().map(HourlyEntry::from).collect(),
        }
    }
}

type ApiError = (StatusCode, Json<MessageResponse>);

fn reject(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(MessageResponse {
            message: message.into(),
        }),
    )
}

// Route handlers
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn get_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherQuery>,
) -> Result<Json<WeatherResponse>, ApiError> {
    let city = match params.city.as_deref() {
        Some(city) if !city.trim().is_empty() => city,
        _ => return Err(reject(StatusCode::BAD_REQUEST, "City parameter is required.")),
    };
    let days = params.days.unwrap_or(DEFAULT_FORECAST_DAYS);
    if days == 0 {
        return Err(reject(StatusCode::BAD_REQUEST, "Days must be at least 1."));
    }

    let cancel = CancellationToken::new();
    match state.fetcher.fetch(city, days, &cancel).await {
        Some(snapshot) => Ok(Json(WeatherResponse::from(snapshot.as_ref()))),
        None => Err(reject(
            StatusCode::NOT_FOUND,
            format!("City '{}' not found or data unavailable.", city),
        )),
    }
}

pub async fn set_default_city(
    State(state): State<AppState>,
    Json(body): Json<DefaultCityRequest>,
) -> Result<Json<DefaultCitySetResponse>, ApiError> {
    if body.city.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "City is required."));
    }

    let cancel = CancellationToken::new();
    let (success, message) = state.default_city.set_default(&body.city, &cancel).await;
    if !success {
        tracing::warn!(city = %body.city, "Invalid default city set attempt");
        return Err(reject(StatusCode::BAD_REQUEST, message));
    }

    Ok(Json(DefaultCitySetResponse {
        city: body.city,
        message,
    }))
}

pub async fn get_default_city(State(state): State<AppState>) -> Json<DefaultCityResponse> {
    Json(DefaultCityResponse {
        city: state.default_city.get_default().await,
    })
}

pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/weatherdashboard", get(get_weather))
        .route(
            "/weatherdashboard/default",
            get(get_default_city).put(set_default_city),
        )
        .with_state(state)
}
