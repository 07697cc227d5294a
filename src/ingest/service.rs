//! Ingestion orchestrator: cache probe, fetch, deduplicated write,
//! cache fill.
//!
//! The sync HTTP path and the worker pool both run this same sequence.

use std::sync::Arc;

use crate::cache::FeedCache;
use crate::feed::{FeedItem, FetchFeed};
use crate::ingest::writer::ItemWriter;
use crate::ingest::CacheStatus;
use crate::store::Datastore;
use crate::Result;

/// Outcome of one fetch-and-store cycle.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Items for this feed (cached or freshly parsed).
    pub items: Vec<FeedItem>,
    /// Items newly written to the store (0 on a cache hit).
    pub new_count: usize,
    /// Whether the items came from cache.
    pub cache: CacheStatus,
}

/// Orchestrates one feed ingestion cycle from capabilities: a fetcher,
/// a store and a cache.
pub struct IngestService {
    fetcher: Arc<dyn FetchFeed>,
    writer: ItemWriter,
    cache: Arc<FeedCache>,
}

impl IngestService {
    /// Build the orchestrator from its capabilities.
    pub fn new(fetcher: Arc<dyn FetchFeed>, store: Arc<dyn Datastore>, cache: Arc<FeedCache>) -> Self {
        Self {
            fetcher,
            writer: ItemWriter::new(store),
            cache,
        }
    }

    /// The deduplicating writer, for cleanup and stats operations.
    pub fn writer(&self) -> &ItemWriter {
        &self.writer
    }

    /// Fetch a feed, persist its items and refresh the cache.
    ///
    /// A validated URL is expected. Unless `force_refresh` is set, a
    /// live cache entry short-circuits the fetch entirely. A writer
    /// failure is fatal to the operation; the cache fill is not.
    pub async fn fetch_and_store(&self, url: &str, force_refresh: bool) -> Result<FetchOutcome> {
        if !force_refresh {
            if let Some(items) = self.cache.feed_items(url) {
                return Ok(FetchOutcome {
                    items,
                    new_count: 0,
                    cache: CacheStatus::Hit,
                });
            }
        }

        let items = self.fetcher.fetch(url).await?;

        let new_count = self.writer.save(&items, None).await.map_err(|e| {
            tracing::error!(url, written = e.written, error = %e, "Failed to save feed items");
            crate::FeedstoreError::from(e)
        })?;

        self.cache.set_feed_items(url, items.clone());

        tracing::info!(
            url,
            items_count = items.len(),
            new_count,
            "Feed processed"
        );

        Ok(FetchOutcome {
            items,
            new_count,
            cache: CacheStatus::Miss,
        })
    }
}
