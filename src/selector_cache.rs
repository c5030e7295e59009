//! Per-site cache of inferred container selectors.
//!
//! Bounded by capacity and time-to-live. On overflow the entry inserted longest ago
//! is evicted; reads use `peek` and do not refresh an entry's position.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

/// One cached site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorCacheEntry {
    pub site_key: String,
    pub selectors: Vec<String>,
    pub written_at: Instant,
}

/// Insertion-ordered store of [`SelectorCacheEntry`] values.
pub struct SelectorCache {
    ttl: Duration,
    /// `None` when the capacity is zero.
    entries: Option<LruCache<String, SelectorCacheEntry>>,
}

impl Default for SelectorCache {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(300))
    }
}

impl SelectorCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            ttl,
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |c| c.cap().get())
    }

    /// Entries currently held, expired ones included until the next write.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&mut self, site_key: &str, selectors: Vec<String>) {
        self.insert_at(site_key, selectors, Instant::now());
    }

    /// Insert as of `now`. Replacing a key counts as a fresh insertion.
    pub fn insert_at(&mut self, site_key: &str, selectors: Vec<String>, now: Instant) {
        self.purge_expired(now);
        let Some(entries) = self.entries.as_mut() else {
            return;
        };

        let entry = SelectorCacheEntry {
            site_key: site_key.to_string(),
            selectors,
            written_at: now,
        };
        if let Some((evicted, _)) = entries.push(site_key.to_string(), entry) {
            if evicted != site_key {
                tracing::debug!(site = %evicted, "selector cache full, evicting oldest entry");
            }
        }
    }

    #[must_use]
    pub fn get(&self, site_key: &str) -> Option<&[String]> {
        self.get_at(site_key, Instant::now())
    }

    /// Selectors for `site_key` unless missing or older than the TTL as of `now`.
    #[must_use]
    pub fn get_at(&self, site_key: &str, now: Instant) -> Option<&[String]> {
        self.entries
            .as_ref()?
            .peek(site_key)
            .filter(|e| !self.is_expired(e, now))
            .map(|e| e.selectors.as_slice())
    }

    pub fn remove(&mut self, site_key: &str) -> Option<SelectorCacheEntry> {
        self.entries.as_mut()?.pop(site_key)
    }

    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }

    /// Site keys from oldest to newest insertion.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|c| c.iter().rev())
            .map(|(key, _)| key.as_str())
    }

    fn is_expired(&self, entry: &SelectorCacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.written_at) >= self.ttl
    }

    fn purge_expired(&mut self, now: Instant) {
        let Some(entries) = self.entries.as_ref() else {
            return;
        };
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| self.is_expired(e, now))
            .map(|(key, _)| key.clone())
            .collect();

        if let Some(entries) = self.entries.as_mut() {
            for key in expired {
                entries.pop(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut cache = SelectorCache::new(3, Duration::from_secs(300));
        let now = Instant::now();
        for i in 0..10 {
            cache.insert_at(&format!("site{i}"), sel("div"), now);
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.capacity(), 3);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["site7", "site8", "site9"]);
    }

    #[test]
    fn test_evicts_oldest_insertion_not_least_recent_read() {
        let mut cache = SelectorCache::new(2, Duration::from_secs(300));
        let now = Instant::now();
        cache.insert_at("a", sel(".a"), now);
        cache.insert_at("b", sel(".b"), now);

        // reading "a" must not protect it
        assert!(cache.get_at("a", now).is_some());
        cache.insert_at("c", sel(".c"), now);

        assert!(cache.get_at("a", now).is_none());
        assert!(cache.get_at("b", now).is_some());
        assert!(cache.get_at("c", now).is_some());
    }

    #[test]
    fn test_reinsert_moves_to_newest() {
        let mut cache = SelectorCache::new(2, Duration::from_secs(300));
        let now = Instant::now();
        cache.insert_at("a", sel(".a"), now);
        cache.insert_at("b", sel(".b"), now);
        cache.insert_at("a", sel(".a2"), now);
        cache.insert_at("c", sel(".c"), now);

        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(cache.get_at("a", now), Some(&[".a2".to_string()][..]));
    }

    #[test]
    fn test_ttl_expiry() {
        let mut cache = SelectorCache::new(10, Duration::from_secs(300));
        let start = Instant::now();
        cache.insert_at("a", sel(".a"), start);

        assert!(cache.get_at("a", start + Duration::from_secs(299)).is_some());
        assert!(cache.get_at("a", start + Duration::from_secs(300)).is_none());

        cache.insert_at("b", sel(".b"), start + Duration::from_secs(301));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = SelectorCache::new(4, Duration::from_secs(300));
        cache.insert("a", sel(".a"));
        cache.insert("b", sel(".b"));

        let removed = cache.remove("a").map(|e| e.selectors);
        assert_eq!(removed, Some(sel(".a")));
        assert!(cache.get("a").is_none());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = SelectorCache::new(0, Duration::from_secs(300));
        cache.insert("a", sel(".a"));
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
        assert_eq!(cache.capacity(), 0);
    }
}
