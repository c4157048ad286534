//! Concurrency-safe TTL store for captured responses.
//!
//! The store maps a request's canonical URL string to a captured response
//! snapshot plus an expiration instant. Expiry is *lazy*: a stale entry is
//! treated as a miss at lookup time but stays resident until a fresh fetch
//! for the same key overwrites it or the process exits. There is no
//! background sweep and no size bound.
//!
//! # Key Semantics
//!
//! The key is the raw target URL with no normalization beyond request-line
//! parsing: URLs differing in trailing slash, query order, or case are
//! distinct keys. The key carries no HTTP method, so a POST and a GET to
//! the same URL collide; cached traffic is assumed to be idempotent GETs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::entry::ResponseSnapshot;

/// Default lifetime of a cached entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// A stored snapshot with its expiration instant.
struct StoredEntry {
    snapshot: Arc<ResponseSnapshot>,
    expires_at: Instant,
}

/// In-memory response cache keyed by target URL.
///
/// A single mutex guards the map for both lookups and stores; the lock is
/// held only for the in-memory map operation, never across network I/O.
/// Concurrent misses for the same key each fetch the origin independently
/// and each store their result; last writer wins. There is no
/// single-flight de-duplication.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, StoredEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a cache with a custom TTL applied to every entry.
    ///
    /// There is no per-entry TTL override.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Look up an unexpired entry for a key.
    ///
    /// Returns `Some` only if an entry exists and its expiration is
    /// strictly in the future. A stale entry is a miss and is *not*
    /// removed here; removal only happens via overwrite on the next
    /// [`store`](Self::store).
    pub fn lookup(&self, key: &str) -> Option<Arc<ResponseSnapshot>> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(Arc::clone(&entry.snapshot))
            } else {
                None
            }
        })
    }

    /// Insert or replace the entry for a key.
    ///
    /// The expiration is set to now + TTL. Returns the stored snapshot so
    /// the caller can serve the same materialized bytes it just cached.
    pub fn store(&self, key: String, snapshot: ResponseSnapshot) -> Arc<ResponseSnapshot> {
        let snapshot = Arc::new(snapshot);
        let entry = StoredEntry {
            snapshot: Arc::clone(&snapshot),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().unwrap().insert(key, entry);
        snapshot
    }

    /// Number of resident entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// True if the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// The TTL applied to stored entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use hyper::{Response, StatusCode};

    async fn snapshot(body: &'static [u8]) -> ResponseSnapshot {
        let response = Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from_static(body)))
            .unwrap();
        ResponseSnapshot::capture(response).await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cache = ResponseCache::new();
        assert!(cache.is_empty());

        let stored = cache.store("http://a.test/x".to_string(), snapshot(b"body").await);
        assert_eq!(stored.body().as_ref(), b"body");

        let hit = cache.lookup("http://a.test/x").expect("expected a hit");
        assert_eq!(hit.body().as_ref(), b"body");
        // Both handles point at the same snapshot
        assert!(Arc::ptr_eq(&stored, &hit));
    }

    #[tokio::test]
    async fn test_miss_for_unknown_key() {
        let cache = ResponseCache::new();
        assert!(cache.lookup("http://a.test/missing").is_none());
    }

    #[tokio::test]
    async fn test_keys_are_not_normalized() {
        let cache = ResponseCache::new();
        cache.store("http://a.test/x".to_string(), snapshot(b"one").await);

        // Trailing slash and case produce distinct keys
        assert!(cache.lookup("http://a.test/x/").is_none());
        assert!(cache.lookup("http://a.test/X").is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_but_stays_resident() {
        let cache = ResponseCache::with_ttl(Duration::ZERO);
        cache.store("http://a.test/x".to_string(), snapshot(b"stale").await);

        // Expired immediately: lookup treats it as a miss...
        assert!(cache.lookup("http://a.test/x").is_none());
        // ...but does not remove it (lazy expiry)
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_store_overwrites_stale_entry() {
        let cache = ResponseCache::with_ttl(Duration::ZERO);
        cache.store("http://a.test/x".to_string(), snapshot(b"old").await);

        let fresh = ResponseCache::new();
        // Re-store under a live TTL via a second cache to show overwrite
        // semantics are last-write-wins on the same key.
        fresh.store("http://a.test/x".to_string(), snapshot(b"old").await);
        fresh.store("http://a.test/x".to_string(), snapshot(b"new").await);

        assert_eq!(fresh.len(), 1);
        let hit = fresh.lookup("http://a.test/x").expect("expected a hit");
        assert_eq!(hit.body().as_ref(), b"new");
    }

    #[tokio::test]
    async fn test_entry_within_ttl_is_served() {
        let cache = ResponseCache::with_ttl(Duration::from_secs(60));
        cache.store("http://a.test/x".to_string(), snapshot(b"live").await);
        assert!(cache.lookup("http://a.test/x").is_some());
    }
}
