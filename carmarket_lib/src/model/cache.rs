//! TTL cache of fitted sales forecasters, backed by `DashMap` for
//! concurrent access.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::forecaster::Forecaster;

struct CacheEntry {
    model: Arc<dyn Forecaster>,
    expires_at: Instant,
}

/// Fitted forecasters keyed by the sales series they were fitted on.
///
/// Expired entries are evicted on the next `get` for that key and on
/// every `set`.
pub struct ForecastCache {
    store: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ForecastCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: DashMap::new(),
            ttl,
        }
    }

    /// Returns the cached forecaster for `key`, or `None` if missing or expired.
    pub fn get(&self, key: &str) -> Option<Arc<dyn Forecaster>> {
        let entry = self.store.get(key)?;
        if Instant::now() > entry.expires_at {
            drop(entry);
            self.store.remove(key);
            return None;
        }
        Some(Arc::clone(&entry.model))
    }

    pub fn set(&self, key: String, model: Arc<dyn Forecaster>) {
        let now = Instant::now();
        self.store.retain(|_, entry| entry.expires_at >= now);
        self.store.insert(
            key,
            CacheEntry {
                model,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Number of stored entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::forecaster::ForecasterKind;
    use carmarket_types::YearlySales;

    fn fitted() -> Arc<dyn Forecaster> {
        let series: Vec<YearlySales> = (2019..2023)
            .map(|year| YearlySales {
                year,
                units: 100.0,
            })
            .collect();
        ForecasterKind::LinearTrend.fit(&series, 3).unwrap()
    }

    #[test]
    fn cache_set_and_get() {
        let cache = ForecastCache::new(Duration::from_secs(60));
        cache.set("vw:golf".to_string(), fitted());
        let model = cache.get("vw:golf").unwrap();
        assert_eq!(model.forecast(1)[0].predicted_units, 100.0);
        assert!(cache.get("audi").is_none());
    }

    #[test]
    fn cache_expiration() {
        let cache = ForecastCache::new(Duration::from_millis(1));
        cache.set("k".to_string(), fitted());
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn set_evicts_expired_entries_for_other_keys() {
        let cache = ForecastCache::new(Duration::from_millis(1));
        cache.set("a".to_string(), fitted());
        cache.set("b".to_string(), fitted());
        std::thread::sleep(Duration::from_millis(10));
        cache.set("c".to_string(), fitted());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn cache_clear() {
        let cache = ForecastCache::new(Duration::from_secs(60));
        cache.set("a".to_string(), fitted());
        cache.set("b".to_string(), fitted());
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.get("a").is_none());
        assert_eq!(cache.len(), 0);
    }
}
