use serde_json::{Map, Value};

/// Generate a cache key for a city/day-count snapshot
pub fn weather_cache_key(city: &str, days: u32) -> String {
    format!("weather_{}_{}", city.trim().to_lowercase(), days)
}

/// Provider icons come back protocol-relative (`//cdn...`); store them absolute.
pub fn absolute_icon_url(icon: &str) -> String {
    if icon.starts_with("//") {
        format!("https:{}", icon)
    } else {
        icon.to_string()
    }
}

/// `"2025-10-25 13:00"` -> `"13:00"`. Values without a date portion pass
/// through whole, so a bare `"09:00"` keeps the point instead of dropping the
/// whole snapshot.
pub fn time_of_day(timestamp: &str) -> String {
    match timestamp.trim().split_once(' ') {
        Some((_, time)) => time.trim().to_string(),
        None => timestamp.trim().to_string(),
    }
}

/// Case-insensitive equality used by the strict-match check.
pub fn same_city(requested: &str, resolved: &str) -> bool {
    requested.to_lowercase() == resolved.to_lowercase()
}

/// Lowercase every object key, recursively, so typed parsing matches
/// provider fields regardless of their casing.
pub fn fold_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| (key.to_lowercase(), fold_keys(inner)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(fold_keys).collect()),
        other => other,
    }
}

/// Keep log lines short when echoing provider bodies
pub fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
