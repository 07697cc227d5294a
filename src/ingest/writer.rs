//! Deduplicating batched writer.
//!
//! Persists parsed feed items to the document store in size-bounded
//! batches, skipping items already present. The key is the item link, so
//! repeated saves of the same input are idempotent per link.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use thiserror::Error;

use crate::feed::FeedItem;
use crate::store::{CompareOp, Datastore, Field, ItemQuery, StoreError};

/// Batch size used when deleting during cleanup.
pub const CLEANUP_BATCH_SIZE: usize = 100;

/// A batch operation that failed partway through.
///
/// `written` counts the items committed by earlier batches; those are
/// not rolled back.
#[derive(Debug, Error)]
#[error("batch operation failed after {written} item(s): {source}")]
pub struct BatchWriteError {
    /// Items committed before the failure.
    pub written: usize,
    /// Underlying store failure.
    #[source]
    pub source: StoreError,
}

impl From<BatchWriteError> for crate::FeedstoreError {
    fn from(err: BatchWriteError) -> Self {
        crate::FeedstoreError::Store(err.source)
    }
}

/// Choose a store batch size from the input item count.
pub fn adaptive_batch_size(item_count: usize) -> usize {
    match item_count {
        0..=10 => 50,
        11..=50 => 200,
        51..=200 => 500,
        201..=1000 => 1000,
        _ => 2000,
    }
}

/// Counts of stored items by age bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStats {
    /// All stored items.
    pub total: usize,
    /// Published within the last 24 hours.
    pub last_24h: usize,
    /// Published between 7 days and 24 hours ago.
    pub last_7d: usize,
    /// Published between 30 and 7 days ago.
    pub last_30d: usize,
    /// Published more than 30 days ago.
    pub older_30d: usize,
}

/// Batched, deduplicating item writer. Stateless against the store.
pub struct ItemWriter {
    store: Arc<dyn Datastore>,
}

impl ItemWriter {
    /// Create a writer over the given store.
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Persist `items`, skipping duplicates of records already stored.
    ///
    /// Returns the number of new items written. When `batch_size` is
    /// absent, the size adapts to the input count.
    ///
    /// The existing set is collected by probing each input's link, then
    /// by an author-keyed candidate scan for inputs with no record under
    /// their link, so the content arms of the duplicate predicate also
    /// catch the same article stored under a different link.
    pub async fn save(
        &self,
        items: &[FeedItem],
        batch_size: Option<usize>,
    ) -> Result<usize, BatchWriteError> {
        let existing = self
            .check_for_duplicates(items)
            .await
            .map_err(|source| BatchWriteError { written: 0, source })?;

        let unique: Vec<&FeedItem> = items
            .iter()
            .filter(|item| match existing.get(&item.content_hash()) {
                Some(found) => !item.is_duplicate(found),
                None => true,
            })
            .collect();

        let batch_size = batch_size
            .filter(|&n| n > 0)
            .unwrap_or_else(|| adaptive_batch_size(items.len()));

        let mut written = 0;
        for chunk in unique.chunks(batch_size) {
            let keys: Vec<String> = chunk.iter().map(|item| item.link.clone()).collect();
            let batch: Vec<FeedItem> = chunk.iter().map(|&item| item.clone()).collect();

            self.store
                .put_many(&keys, &batch)
                .await
                .map_err(|source| BatchWriteError { written, source })?;

            written += chunk.len();
        }

        Ok(written)
    }

    /// Collect stored records that the inputs may duplicate, keyed by
    /// the input item's content hash.
    ///
    /// Each input is probed by link first. Inputs with no record under
    /// their link are matched against stored items by the same author,
    /// which covers the `(title, author)` and content-hash arms of the
    /// duplicate predicate (both imply an equal author).
    async fn check_for_duplicates(
        &self,
        items: &[FeedItem],
    ) -> Result<HashMap<String, FeedItem>, StoreError> {
        let mut existing = HashMap::new();

        for item in items {
            if let Some(found) = self.store.get_by_key(&item.link).await? {
                existing.insert(item.content_hash(), found);
                continue;
            }

            let candidates = self
                .store
                .query(&ItemQuery::new().filter(
                    Field::Author,
                    CompareOp::Eq,
                    item.author.clone(),
                ))
                .await?;

            if let Some(found) = candidates
                .items
                .into_iter()
                .find(|candidate| item.is_duplicate(candidate))
            {
                existing.insert(item.content_hash(), found);
            }
        }

        Ok(existing)
    }

    /// Delete items published before `older_than`, in fixed-size key
    /// batches. Returns the number deleted.
    pub async fn cleanup(
        &self,
        older_than: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<usize, BatchWriteError> {
        let cutoff = older_than.to_rfc3339_opts(SecondsFormat::Secs, true);

        let page = self
            .store
            .query(
                &ItemQuery::new()
                    .filter(Field::PubDate, CompareOp::Lt, cutoff)
                    .keys_only(),
            )
            .await
            .map_err(|source| BatchWriteError { written: 0, source })?;

        if page.keys.is_empty() {
            return Ok(0);
        }

        let mut deleted = 0;
        for chunk in page.keys.chunks(batch_size.max(1)) {
            self.store
                .delete_many(chunk)
                .await
                .map_err(|source| BatchWriteError {
                    written: deleted,
                    source,
                })?;
            deleted += chunk.len();
        }

        Ok(deleted)
    }

    /// Count stored items by publication-age bucket.
    pub async fn item_stats(&self) -> Result<ItemStats, StoreError> {
        let now = Utc::now();
        let fmt = |dt: DateTime<Utc>| dt.to_rfc3339_opts(SecondsFormat::Secs, true);

        let day_ago = fmt(now - ChronoDuration::hours(24));
        let week_ago = fmt(now - ChronoDuration::days(7));
        let month_ago = fmt(now - ChronoDuration::days(30));

        let total = self
            .store
            .query(&ItemQuery::new().keys_only())
            .await?
            .keys
            .len();

        let count = |from: Option<String>, to: Option<String>| {
            let mut query = ItemQuery::new().keys_only();
            if let Some(from) = from {
                query = query.filter(Field::PubDate, CompareOp::Ge, from);
            }
            if let Some(to) = to {
                query = query.filter(Field::PubDate, CompareOp::Lt, to);
            }
            query
        };

        let last_24h = self
            .store
            .query(&count(Some(day_ago.clone()), None))
            .await?
            .keys
            .len();
        let last_7d = self
            .store
            .query(&count(Some(week_ago.clone()), Some(day_ago)))
            .await?
            .keys
            .len();
        let last_30d = self
            .store
            .query(&count(Some(month_ago.clone()), Some(week_ago)))
            .await?
            .keys
            .len();
        let older_30d = self
            .store
            .query(&count(None, Some(month_ago)))
            .await?
            .keys
            .len();

        Ok(ItemStats {
            total,
            last_24h,
            last_7d,
            last_30d,
            older_30d,
        })
    }
}
