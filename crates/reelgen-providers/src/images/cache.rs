//! In-process cache of search results.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    provider: String,
    urls: Vec<String>,
    stored_at: Instant,
}

/// Search results keyed by caller-chosen cache key.
#[derive(Debug)]
pub struct ImageCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ImageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Provider and URLs for `key` when fresh and holding at least `min` URLs.
    pub fn get(&self, key: &str, min: usize) -> Option<(String, Vec<String>)> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() >= self.ttl {
            entries.remove(key);
            return None;
        }
        (entry.urls.len() >= min).then(|| (entry.provider.clone(), entry.urls.clone()))
    }

    pub fn put(&self, key: impl Into<String>, provider: impl Into<String>, urls: Vec<String>) {
        let entry = CacheEntry {
            provider: provider.into(),
            urls,
            stored_at: Instant::now(),
        };
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://img.test/{i}.jpg")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = ImageCache::new(Duration::from_secs(60));
        cache.put("cats", "pexels", urls(3));

        assert!(cache.get("cats", 3).is_some());
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get("cats", 3).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_short_entries_are_not_reused() {
        let cache = ImageCache::default();
        cache.put("cats", "pixabay", urls(2));

        assert!(cache.get("cats", 3).is_none());
        let (provider, hit) = cache.get("cats", 2).unwrap();
        assert_eq!(provider, "pixabay");
        assert_eq!(hit.len(), 2);
    }
}
