//! Injectable key/value cache with per-entry time-to-live.
//!
//! Components that need to remember something across calls (the OAuth
//! token, geocoded depot addresses) take an `Arc<dyn Cache<K, V>>` instead
//! of reaching for a process-wide static map.
//!
//! Expiry is measured with [`tokio::time::Instant`], so tests running on a
//! paused tokio clock can advance past a TTL deterministically.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Key/value store with TTL semantics.
pub trait Cache<K, V>: Send + Sync {
    /// Returns the value if present and not expired.
    fn get(&self, key: &K) -> Option<V>;

    /// Stores a value that expires after `ttl`.
    fn insert(&self, key: K, value: V, ttl: Duration);

    /// Removes a value, returning it if it was present and live.
    fn remove(&self, key: &K) -> Option<V>;
}

/// In-memory [`Cache`] backed by a `HashMap` behind a `parking_lot` lock.
///
/// # Examples
///
/// ```
/// use route_optimizer::cache::{Cache, TtlCache};
/// use std::time::Duration;
///
/// let cache = TtlCache::new();
/// cache.insert("token", "abc".to_string(), Duration::from_secs(60));
/// assert_eq!(cache.get(&"token").as_deref(), Some("abc"));
/// ```
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, (V, Instant)>>,
}

impl<K, V> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
{
    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops all expired entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.write().retain(|_, (_, expires)| *expires > now);
    }
}

impl<K, V> Cache<K, V> for TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    fn insert(&self, key: K, value: V, ttl: Duration) {
        let expires = Instant::now() + ttl;
        self.entries.write().insert(key, (value, expires));
    }

    fn remove(&self, key: &K) -> Option<V> {
        let (value, expires) = self.entries.write().remove(key)?;
        (expires > Instant::now()).then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = TtlCache::new();
        cache.insert("k".to_string(), 7u32, Duration::from_secs(10));
        assert_eq!(cache.get(&"k".to_string()), Some(7));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get(&"k".to_string()), Some(7));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&"k".to_string()), None);

        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_overwrites_and_remove() {
        let cache: TtlCache<&str, &str> = TtlCache::new();
        cache.insert("a", "one", Duration::from_secs(5));
        cache.insert("a", "two", Duration::from_secs(5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.remove(&"a"), Some("two"));
        assert_eq!(cache.get(&"a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_usable_as_trait_object() {
        let cache: std::sync::Arc<dyn Cache<String, String>> = std::sync::Arc::new(TtlCache::new());
        cache.insert("x".into(), "y".into(), Duration::from_millis(100));
        assert_eq!(cache.get(&"x".to_string()).as_deref(), Some("y"));
    }
}
