//! `ResponseCache`. A thread-safe, TTL-bounded map guarded by a single
//! mutex; reads return cloned values to satisfy the thread-safety
//! requirement, rather than handing back references.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::Bytes;
use mcpay_config::CacheConfig;
use mcpay_utils::fingerprint;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.inserted_at + self.ttl > now
    }
}

/// Builds the cache key `"<METHOD>:<URL>:<bodyFingerprint>"`.
/// `bodyFingerprint` is the base64 of the first 32 bytes of the raw body,
/// empty for `GET`.
pub fn cache_key(method: &str, url: &str, body: &[u8]) -> String {
    let fp = if method.eq_ignore_ascii_case("GET") {
        String::new()
    } else {
        fingerprint(body, 32)
    };
    format!("{}:{}:{}", method, url, fp)
}

/// Selects the TTL for a newly-cached response based on the upstream host:
/// CoinGecko gets its own longer TTL, `api.*` hosts a shorter one,
/// everything else the default.
pub fn select_ttl(host: &str, config: &CacheConfig) -> Duration {
    if host.contains("coingecko.com") {
        Duration::from_millis(config.coingecko_ttl_ms)
    } else if host.starts_with("api.") {
        Duration::from_millis(config.api_ttl_ms)
    } else {
        Duration::from_millis(config.default_ttl_ms)
    }
}

pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_size: usize,
    max_body_bytes: usize,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size: config.max_cache_size,
            max_body_bytes: config.max_cached_body_bytes,
        }
    }

    /// Reads only succeed for `GET` (enforced by the caller using
    /// `cache_key`, which is only computed for `GET`). Expired entries are
    /// never returned and are evicted lazily on access.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores a response. Bodies larger than `max_cached_body_bytes` are
    /// not cached at all, so memory stays
    /// bounded regardless of TTL.
    pub fn insert(&self, key: String, entry: CacheEntry) {
        if entry.body.len() > self.max_body_bytes {
            return;
        }
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key, entry);
        if entries.len() > self.max_size {
            self.sweep_expired(&mut entries);
        }
    }

    /// Eviction sweeps all expired entries; no LRU is required.
    fn sweep_expired(&self, entries: &mut HashMap<String, CacheEntry>) {
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ttl_ms: u64) -> CacheEntry {
        CacheEntry {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![],
            body: Bytes::from_static(b"hello"),
            inserted_at: Instant::now(),
            ttl: Duration::from_millis(ttl_ms),
        }
    }

    #[test]
    fn cache_key_is_empty_fingerprint_for_get() {
        let key = cache_key("GET", "https://api.example.com/x", b"ignored");
        assert_eq!(key, "GET:https://api.example.com/x:");
    }

    #[test]
    fn cache_key_includes_fingerprint_for_non_get() {
        let key = cache_key("POST", "https://api.example.com/x", b"body");
        assert!(key.starts_with("POST:https://api.example.com/x:"));
        assert!(!key.ends_with(':'));
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = ResponseCache::new(&CacheConfig {
            max_cache_size: 10,
            ..Default::default()
        });
        cache.insert("k".to_string(), entry(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn live_entry_round_trips() {
        let cache = ResponseCache::new(&CacheConfig {
            max_cache_size: 10,
            ..Default::default()
        });
        cache.insert("k".to_string(), entry(60_000));
        let got = cache.get("k").unwrap();
        assert_eq!(got.body, Bytes::from_static(b"hello"));
    }

    #[test]
    fn oversize_body_is_not_cached() {
        let cache = ResponseCache::new(&CacheConfig {
            max_cache_size: 10,
            max_cached_body_bytes: 2,
            ..Default::default()
        });
        cache.insert("k".to_string(), entry(60_000));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn select_ttl_prefers_coingecko_then_api_then_default() {
        let config = CacheConfig::default();
        assert_eq!(
            select_ttl("api.coingecko.com", &config),
            Duration::from_millis(config.coingecko_ttl_ms)
        );
        assert_eq!(
            select_ttl("api.example.com", &config),
            Duration::from_millis(config.api_ttl_ms)
        );
        assert_eq!(
            select_ttl("example.com", &config),
            Duration::from_millis(config.default_ttl_ms)
        );
    }
}
