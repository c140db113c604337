use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::fetcher::SnapshotFetcher;
use crate::cache::{CachePriority, CacheStore, CachedValue, ExpirationPolicy};

pub const DEFAULT_CITY_KEY: &str = "DefaultCity";

const DEFAULT_CITY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Remembers one preferred city, stored in the shared cache.
pub struct DefaultCityPointer {
    fetcher: Arc<SnapshotFetcher>,
    cache: CacheStore,
}

impl DefaultCityPointer {
    pub fn new(fetcher: Arc<SnapshotFetcher>) -> Self {
        let cache = fetcher.cache().clone();
        Self { fetcher, cache }
    }

    /// Stores `city` verbatim once the provider resolves it exactly.
    pub async fn set_default(&self, city: &str, cancel: &CancellationToken) -> (bool, String) {
        if self.fetcher.fetch(city, 1, cancel).await.is_none() {
            return (false, format!("City '{}' is not valid.", city));
        }

        let policy = ExpirationPolicy::absolute(DEFAULT_CITY_TTL).with_priority(CachePriority::High);
        self.cache
            .set(DEFAULT_CITY_KEY, CachedValue::Text(city.to_string()), policy)
            .await;
        tracing::info!(city, "Default city set");

        (true, format!("'{}' has been set as the default city.", city))
    }

    pub async fn get_default(&self) -> Option<String> {
        self.cache.get_text(DEFAULT_CITY_KEY).await
    }
}
