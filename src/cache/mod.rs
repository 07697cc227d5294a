//! Adaptive in-memory cache for feed parses and query results.
//!
//! Entries expire individually; reads treat expired entries as misses
//! and a background sweeper removes them periodically. Feed entries get
//! a TTL adapted to the feed's observed update cadence, query-result
//! entries always use the configured items TTL.

pub mod ttl;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::config::CacheConfig;
use crate::feed::FeedItem;

pub use ttl::adaptive_feed_ttl;

/// Interval between sweeps of expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A cached list of items with an expiry.
#[derive(Debug, Clone)]
struct CacheEntry {
    items: Vec<FeedItem>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Expiring map from opaque keys to item lists.
#[derive(Debug, Default)]
pub struct Cache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl Cache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`; expired entries are misses but stay in the map
    /// until the next sweep.
    pub fn get(&self, key: &str) -> Option<Vec<FeedItem>> {
        let entries = self.entries.read().unwrap();
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.items.clone()),
            _ => None,
        }
    }

    /// Store `items` under `key` for `ttl`.
    pub fn set(&self, key: impl Into<String>, items: Vec<FeedItem>, ttl: Duration) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key.into(),
            CacheEntry {
                items,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove a single entry.
    pub fn delete(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Number of entries, including expired ones awaiting a sweep.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache facade for feed parses and stored-item query results.
pub struct FeedCache {
    cache: Cache,
    ttls: CacheConfig,
    sweeper_shutdown: watch::Sender<bool>,
}

impl FeedCache {
    /// Create a cache with the given TTL configuration.
    pub fn new(ttls: CacheConfig) -> Self {
        let (sweeper_shutdown, _) = watch::channel(false);
        Self {
            cache: Cache::new(),
            ttls,
            sweeper_shutdown,
        }
    }

    /// Spawn the background sweeper task.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) {
        let cache = Arc::clone(self);
        let mut shutdown = self.sweeper_shutdown.subscribe();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await; // first tick completes immediately
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let removed = cache.cache.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired cache entries");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    /// Stop the background sweeper.
    pub fn shutdown(&self) {
        let _ = self.sweeper_shutdown.send(true);
    }

    /// Cached items for a feed URL.
    pub fn feed_items(&self, url: &str) -> Option<Vec<FeedItem>> {
        let hit = self.cache.get(&feed_key(url));
        match &hit {
            Some(items) => {
                tracing::debug!(url, items_count = items.len(), "Cache hit for feed")
            }
            None => tracing::debug!(url, "Cache miss for feed"),
        }
        hit
    }

    /// Cache a feed's items with a TTL adapted to its update cadence.
    pub fn set_feed_items(&self, url: &str, items: Vec<FeedItem>) {
        let ttl = adaptive_feed_ttl(&items, &self.ttls);
        tracing::debug!(
            url,
            items_count = items.len(),
            ttl_secs = ttl.as_secs(),
            "Caching feed with adaptive TTL"
        );
        self.cache.set(feed_key(url), items, ttl);
    }

    /// Cached result list for a composite query key.
    pub fn stored_items(&self, query_key: &str) -> Option<Vec<FeedItem>> {
        self.cache.get(query_key)
    }

    /// Cache a query result list under its composite key.
    pub fn set_stored_items(&self, query_key: &str, items: Vec<FeedItem>) {
        self.cache.set(query_key, items, self.ttls.default_items_ttl);
    }

    /// Drop the cached entry for a feed URL.
    pub fn invalidate_feed(&self, url: &str) {
        self.cache.delete(&feed_key(url));
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

fn feed_key(url: &str) -> String {
    format!("feed:{url}")
}
