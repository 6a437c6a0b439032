//! An in-memory, TTL-bounded cache for GitHub API responses.
//!
//! Entries are keyed by a digest of the endpoint and its query parameters
//! and expire lazily: an expired entry is only dropped when it's read
//! again, or when [`ResponseCache::cleanup_expired`] sweeps the store.

use std::{
    collections::{BTreeMap, HashMap},
    time::{Duration, Instant},
};

use itertools::Itertools as _;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Query parameters for a GitHub API request.
///
/// Parameters are ordered by name, which makes any serialization of them
/// (and therefore any cache key derived from them) canonical.
pub(crate) type Params = BTreeMap<String, String>;

/// Builds a [`Params`] from borrowed name/value pairs.
pub(crate) fn params<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// The default time-to-live for a cached response.
pub(crate) const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// The rough per-entry footprint used for [`CacheStats::memory_estimate_bytes`].
const ENTRY_SIZE_ESTIMATE: usize = 1024;

#[derive(Serialize)]
struct KeyMaterial<'a> {
    endpoint: &'a str,
    params: &'a Params,
}

/// A cache key: the hex-encoded SHA-256 digest of the canonical JSON
/// serialization of an endpoint and its parameters.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) struct CacheKey(String);

impl CacheKey {
    pub(crate) fn new(endpoint: &str, params: &Params) -> Self {
        // Serializing a struct of a string and a BTreeMap of strings can't fail,
        // but we'd rather degrade to an endpoint-only key than panic.
        let material = serde_json::to_vec(&KeyMaterial { endpoint, params })
            .unwrap_or_else(|_| endpoint.as_bytes().to_vec());

        Self(hex::encode(Sha256::digest(material)))
    }
}

#[derive(Clone, Debug)]
pub(crate) struct CacheEntry {
    pub(crate) value: Value,
    pub(crate) created_at: Instant,
    pub(crate) expires_at: Instant,
    pub(crate) endpoint: String,
    pub(crate) params: Params,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    /// The entry's endpoint and parameters, rendered like a request path.
    fn describe(&self) -> String {
        if self.params.is_empty() {
            self.endpoint.clone()
        } else {
            format!(
                "{endpoint}?{query}",
                endpoint = self.endpoint,
                query = self.params.iter().map(|(k, v)| format!("{k}={v}")).join("&")
            )
        }
    }
}

/// Running counters for a [`ResponseCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    evictions: u64,
}

/// A point-in-time snapshot of a [`ResponseCache`]'s counters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct CacheStats {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) sets: u64,
    pub(crate) evictions: u64,
    /// Hits as a percentage of all lookups, rounded to two decimal places.
    pub(crate) hit_rate: f64,
    pub(crate) size: usize,
    pub(crate) memory_estimate_bytes: usize,
}

#[derive(Debug)]
pub(crate) struct ResponseCache {
    entries: HashMap<CacheKey, CacheEntry>,
    default_ttl: Duration,
    counters: Counters,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResponseCache {
    pub(crate) fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            counters: Counters::default(),
        }
    }

    /// Returns the cached value for `endpoint` and `params`, if a live one exists.
    pub(crate) fn get(&mut self, endpoint: &str, params: &Params) -> Option<Value> {
        self.get_at(endpoint, params, Instant::now())
    }

    pub(crate) fn get_at(&mut self, endpoint: &str, params: &Params, now: Instant) -> Option<Value> {
        let key = CacheKey::new(endpoint, params);

        match self.entries.get(&key) {
            Some(entry) if entry.is_live(now) => {
                self.counters.hits += 1;
                tracing::debug!(
                    "cache hit for {request} (age {age}s)",
                    request = entry.describe(),
                    age = now.saturating_duration_since(entry.created_at).as_secs()
                );
                Some(entry.value.clone())
            }
            Some(entry) => {
                tracing::debug!("cache entry for {request} expired", request = entry.describe());
                self.entries.remove(&key);
                self.counters.evictions += 1;
                self.counters.misses += 1;
                None
            }
            None => {
                self.counters.misses += 1;
                None
            }
        }
    }

    /// Stores `value` for `endpoint` and `params`, replacing any existing entry.
    ///
    /// A `ttl` of `None` uses the cache's default.
    pub(crate) fn set(
        &mut self,
        endpoint: &str,
        params: &Params,
        value: Value,
        ttl: Option<Duration>,
    ) {
        self.set_at(endpoint, params, value, ttl, Instant::now())
    }

    pub(crate) fn set_at(
        &mut self,
        endpoint: &str,
        params: &Params,
        value: Value,
        ttl: Option<Duration>,
        now: Instant,
    ) {
        let ttl = ttl.unwrap_or(self.default_ttl);

        self.entries.insert(
            CacheKey::new(endpoint, params),
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
                endpoint: endpoint.to_string(),
                params: params.clone(),
            },
        );
        self.counters.sets += 1;
    }

    /// Drops every entry and resets all counters.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.counters = Counters::default();
    }

    /// Drops every expired entry, returning how many were removed.
    ///
    /// Each removal counts as an eviction.
    pub(crate) fn cleanup_expired(&mut self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    pub(crate) fn cleanup_expired_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before - self.entries.len();

        self.counters.evictions += removed as u64;
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let Counters {
            hits,
            misses,
            sets,
            evictions,
        } = self.counters;

        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            ((hits as f64 / lookups as f64) * 10_000.0).round() / 100.0
        };

        CacheStats {
            hits,
            misses,
            sets,
            evictions,
            hit_rate,
            size: self.entries.len(),
            memory_estimate_bytes: self.entries.len() * ENTRY_SIZE_ESTIMATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use serde_json::json;

    use super::{CacheKey, ResponseCache, params};

    #[test]
    fn test_cache_key_ignores_param_order() {
        let forward = params([("per_page", "100"), ("page", "2")]);
        let backward = params([("page", "2"), ("per_page", "100")]);

        assert_eq!(
            CacheKey::new("/user/repos", &forward),
            CacheKey::new("/user/repos", &backward)
        );
    }

    #[test]
    fn test_cache_key_distinguishes_inputs() {
        let base = CacheKey::new("/user/repos", &params([("page", "1")]));

        for (endpoint, p) in [
            ("/user/repos", params([("page", "2")])),
            ("/user/repos", params([])),
            ("/user/orgs", params([("page", "1")])),
            ("/user/repos", params([("page", "1"), ("per_page", "1")])),
        ] {
            assert_ne!(base, CacheKey::new(endpoint, &p));
        }
    }

    #[test]
    fn test_set_then_get() {
        let mut cache = ResponseCache::default();
        let p = params([("per_page", "1")]);
        let value = json!([{"full_name": "octocat/hello-world"}]);

        cache.set("/user/repos", &p, value.clone(), None);
        assert_eq!(cache.get("/user/repos", &p), Some(value));

        // Same parameters, built in a different order.
        let mut reordered = p.clone();
        reordered.insert("per_page".into(), "1".into());
        assert!(cache.get("/user/repos", &reordered).is_some());

        // Different parameters miss.
        assert!(cache.get("/user/repos", &params([("per_page", "2")])).is_none());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.sets), (2, 1, 1));
        assert_eq!(stats.hit_rate, 66.67);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.memory_estimate_bytes, 1024);
    }

    #[test]
    fn test_expired_entry_is_evicted_once() {
        let mut cache = ResponseCache::default();
        let p = params([]);
        let start = Instant::now();

        cache.set_at("/user", &p, json!({"login": "octocat"}), Some(Duration::from_secs(60)), start);

        let before_expiry = start + Duration::from_secs(59);
        assert!(cache.get_at("/user", &p, before_expiry).is_some());

        // Expiry is exclusive: at exactly `expires_at` the entry is stale.
        let at_expiry = start + Duration::from_secs(60);
        assert!(cache.get_at("/user", &p, at_expiry).is_none());
        assert!(cache.get_at("/user", &p, at_expiry).is_none());

        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_default_ttl() {
        let mut cache = ResponseCache::new(Duration::from_secs(10));
        let p = params([]);
        let start = Instant::now();

        cache.set_at("/rate_limit", &p, json!({}), None, start);
        assert!(cache.get_at("/rate_limit", &p, start + Duration::from_secs(9)).is_some());
        assert!(cache.get_at("/rate_limit", &p, start + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn test_cleanup_expired() {
        let mut cache = ResponseCache::default();
        let start = Instant::now();

        cache.set_at("/a", &params([]), json!(1), Some(Duration::from_secs(1)), start);
        cache.set_at("/b", &params([]), json!(2), Some(Duration::from_secs(100)), start);

        assert_eq!(cache.cleanup_expired_at(start + Duration::from_secs(5)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_clear() {
        let mut cache = ResponseCache::default();
        cache.set("/user", &params([]), json!({}), None);
        cache.get("/user", &params([]));

        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!((stats.hits, stats.misses, stats.sets, stats.evictions), (0, 0, 0, 0));
        assert_eq!(stats.hit_rate, 0.0);
    }
}
