use serde::{Deserialize, Serialize};

/// Validated, normalized weather for one city/day-count pair.
///
/// Snapshots are never mutated after construction; the cache hands out
/// clones of one `Arc` so warm reads share the same instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub temperature: f64,
    pub description: String,
    pub humidity: f64,
    pub wind_speed_kph: f64,
    pub icon_url: String,
    /// Future days only, today is dropped.
    pub forecast: Vec<ForecastDay>,
    /// Up to 12 points from today's hour list.
    pub hourly: Vec<HourlyPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub average_temp: f64,
    pub description: String,
    pub icon_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    /// `HH:MM`, date portion stripped.
    pub time_of_day: String,
    pub temperature: f64,
    pub icon_url: String,
}

// Provider (weatherapi.com forecast.json) response shape. Keys are folded to
// lowercase before deserializing, so every field here is lowercase.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastApiResponse {
    pub location: Option<ApiLocation>,
    pub current: Option<ApiCurrent>,
    pub forecast: Option<ApiForecast>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiLocation {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCurrent {
    #[serde(default)]
    pub temp_c: f64,
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub wind_kph: f64,
    pub condition: Option<ApiCondition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCondition {
    pub text: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiForecast {
    #[serde(default)]
    pub forecastday: Vec<ApiForecastDay>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiForecastDay {
    pub date: Option<String>,
    pub day: Option<ApiDay>,
    #[serde(default)]
    pub hour: Vec<ApiHour>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiDay {
    #[serde(default)]
    pub avgtemp_c: f64,
    pub condition: Option<ApiCondition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiHour {
    pub time: Option<String>,
    #[serde(default)]
    pub temp_c: f64,
    pub condition: Option<ApiCondition>,
}

impl ApiCondition {
    pub fn text_or_empty(condition: Option<&ApiCondition>) -> String {
        condition
            .and_then(|c| c.text.clone())
            .unwrap_or_default()
    }

    pub fn icon_or_empty(condition: Option<&ApiCondition>) -> &str {
        condition.and_then(|c| c.icon.as_deref()).unwrap_or("")
    }
}
