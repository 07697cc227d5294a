//! Paginated, filtered reads of stored items.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::FeedCache;
use crate::feed::FeedItem;
use crate::ingest::CacheStatus;
use crate::store::{CompareOp, Datastore, Field, ItemQuery, QueryPage};
use crate::Result;

/// Default page size.
pub const DEFAULT_LIMIT: usize = 100;

/// Maximum page size.
pub const MAX_LIMIT: usize = 1000;

/// Filter parameters for stored-item reads.
#[derive(Debug, Clone, Default)]
pub struct ItemsFilter {
    /// Prefix filter on the item link.
    pub source: Option<String>,
    /// Exact author match.
    pub author: Option<String>,
    /// Inclusive lower bound on `pub_date` (RFC 3339, UTC).
    pub date_from: Option<String>,
    /// Inclusive upper bound on `pub_date` (RFC 3339, UTC).
    pub date_to: Option<String>,
    /// Case-insensitive substring match on title or description,
    /// applied after store retrieval.
    pub keyword: Option<String>,
}

/// Pagination and filter parameters for a read.
#[derive(Debug, Clone, Default)]
pub struct ItemsQuery {
    /// Page size; defaults to [`DEFAULT_LIMIT`], clamped to
    /// `[1, MAX_LIMIT]`.
    pub limit: Option<usize>,
    /// Matching results to skip.
    pub offset: usize,
    /// Opaque cursor from a previous page (`offset:N`); overrides
    /// `offset` when it parses.
    pub cursor: Option<String>,
    /// Field filters.
    pub filter: ItemsFilter,
}

/// One page of stored items with pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedItems {
    /// Items on this page.
    pub items: Vec<FeedItem>,
    /// Total number of records matching the structural filters
    /// (before the keyword post-filter).
    pub total_count: usize,
    /// Whether more matching records exist past this page.
    pub has_more: bool,
    /// Cursor for the next page, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Reader over stored items. Stateless against the store; result pages
/// are memoized in the cache under a composite key of all parameters.
pub struct ItemReader {
    store: Arc<dyn Datastore>,
    cache: Arc<FeedCache>,
}

impl ItemReader {
    /// Create a reader over the given store and cache.
    pub fn new(store: Arc<dyn Datastore>, cache: Arc<FeedCache>) -> Self {
        Self { store, cache }
    }

    /// Fetch one page of stored items.
    ///
    /// The keyword filter runs after the store query, so a page can
    /// carry fewer than `limit` items while deeper matches exist;
    /// `total_count` counts the pre-keyword matching set.
    pub async fn fetch(&self, params: &ItemsQuery) -> Result<(PaginatedItems, CacheStatus)> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let mut offset = params.offset;
        if let Some(cursor_offset) = params.cursor.as_deref().and_then(parse_cursor) {
            offset = cursor_offset;
        }

        let cache_key = composite_key(limit, offset, params);
        if let Some(cached) = self.cache.stored_items(&cache_key) {
            let result = PaginatedItems {
                total_count: cached.len(),
                has_more: cached.len() == limit,
                next_cursor: None,
                items: cached,
            };
            return Ok((result, CacheStatus::Hit));
        }

        let query = build_query(&params.filter)
            .order_by_pub_date_desc()
            .limit(limit)
            .offset(offset);
        let page: QueryPage = self.store.query(&query).await.map_err(crate::FeedstoreError::from)?;

        let mut items = page.items;
        if let Some(keyword) = params
            .filter
            .keyword
            .as_deref()
            .filter(|k| !k.is_empty())
        {
            let keyword = keyword.to_lowercase();
            items.retain(|item| {
                item.title.to_lowercase().contains(&keyword)
                    || item.description.to_lowercase().contains(&keyword)
            });
        }

        let count_query = build_query(&params.filter).keys_only();
        let total_count = self
            .store
            .query(&count_query)
            .await
            .map_err(crate::FeedstoreError::from)?
            .keys
            .len();

        let has_more = offset + items.len() < total_count;
        let next_cursor = if has_more && !page.keys.is_empty() {
            Some(format!("offset:{}", offset + items.len()))
        } else {
            None
        };

        self.cache.set_stored_items(&cache_key, items.clone());

        let result = PaginatedItems {
            items,
            total_count,
            has_more,
            next_cursor,
        };
        Ok((result, CacheStatus::Miss))
    }

    /// Fetch up to [`MAX_LIMIT`] newest items without filters.
    pub async fn fetch_legacy(&self) -> Result<Vec<FeedItem>> {
        let query = ItemQuery::new()
            .order_by_pub_date_desc()
            .limit(MAX_LIMIT);
        let page = self.store.query(&query).await.map_err(crate::FeedstoreError::from)?;
        Ok(page.items)
    }
}

/// Compose store filters in the fixed order: source prefix range,
/// author equality, then publication date bounds.
fn build_query(filter: &ItemsFilter) -> ItemQuery {
    let mut query = ItemQuery::new();

    if let Some(source) = filter.source.as_deref().filter(|s| !s.is_empty()) {
        query = query
            .filter(Field::Link, CompareOp::Gt, source)
            .filter(Field::Link, CompareOp::Lt, format!("{source}\u{fffd}"));
    }

    if let Some(author) = filter.author.as_deref().filter(|a| !a.is_empty()) {
        query = query.filter(Field::Author, CompareOp::Eq, author);
    }

    if let Some(date_from) = filter.date_from.as_deref().filter(|d| !d.is_empty()) {
        query = query.filter(Field::PubDate, CompareOp::Ge, date_from);
    }

    if let Some(date_to) = filter.date_to.as_deref().filter(|d| !d.is_empty()) {
        query = query.filter(Field::PubDate, CompareOp::Le, date_to);
    }

    query
}

/// Parse an `offset:N` cursor. Unknown shapes are ignored.
fn parse_cursor(cursor: &str) -> Option<usize> {
    cursor.strip_prefix("offset:")?.parse().ok()
}

/// Composite cache key over every read parameter.
fn composite_key(limit: usize, offset: usize, params: &ItemsQuery) -> String {
    let f = &params.filter;
    format!(
        "items:limit:{limit}:offset:{offset}:cursor:{}:source:{}:author:{}:date_from:{}:date_to:{}:keyword:{}",
        params.cursor.as_deref().unwrap_or(""),
        f.source.as_deref().unwrap_or(""),
        f.author.as_deref().unwrap_or(""),
        f.date_from.as_deref().unwrap_or(""),
        f.date_to.as_deref().unwrap_or(""),
        f.keyword.as_deref().unwrap_or(""),
    )
}
