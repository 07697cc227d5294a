//! Document-store adapter.
//!
//! A thin, retry-free contract over the external document store: keyed
//! gets, batched upserts and deletes, and conjunctive filtered queries.
//! Callers own retry and batching policy.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::feed::FeedItem;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Store-level error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend reported a failure.
    #[error("datastore error: {0}")]
    Backend(String),

    /// The backend could not be reached.
    #[error("datastore unavailable: {0}")]
    Unavailable(String),
}

/// Queryable fields of the stored item record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Canonical item URL (the record key).
    Link,
    /// Item author.
    Author,
    /// Publication timestamp (RFC 3339 string).
    PubDate,
}

impl Field {
    /// Column name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Link => "link",
            Field::Author => "author",
            Field::PubDate => "pub_date",
        }
    }
}

/// Comparison operator of a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equality.
    Eq,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Le,
}

impl CompareOp {
    /// SQL operator of the comparison.
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    /// Apply the comparison to two string values.
    ///
    /// `pub_date` values are UTC-normalized RFC 3339 strings at ingestion,
    /// so lexicographic comparison orders them chronologically.
    pub fn matches(&self, lhs: &str, rhs: &str) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
        }
    }
}

/// A single conjunctive filter on a queryable field.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    /// Field being filtered.
    pub field: Field,
    /// Comparison operator.
    pub op: CompareOp,
    /// Comparison value.
    pub value: String,
}

impl FieldFilter {
    /// Construct a filter.
    pub fn new(field: Field, op: CompareOp, value: impl Into<String>) -> Self {
        Self {
            field,
            op,
            value: value.into(),
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    /// Newest first by publication date.
    PubDateDesc,
}

/// A filtered, optionally paginated query over stored items.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    /// Conjunctive field filters.
    pub filters: Vec<FieldFilter>,
    /// Result ordering.
    pub order: Option<OrderBy>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Number of matching results to skip.
    pub offset: usize,
    /// Return keys only (items list stays empty).
    pub keys_only: bool,
}

impl ItemQuery {
    /// An unfiltered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field filter.
    pub fn filter(mut self, field: Field, op: CompareOp, value: impl Into<String>) -> Self {
        self.filters.push(FieldFilter::new(field, op, value));
        self
    }

    /// Order results newest first.
    pub fn order_by_pub_date_desc(mut self) -> Self {
        self.order = Some(OrderBy::PubDateDesc);
        self
    }

    /// Limit the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` matching results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Request keys only.
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }
}

/// One page of query results.
///
/// `items` is empty for keys-only queries; otherwise `keys` and `items`
/// correspond index-wise.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    /// Keys of the matching records.
    pub keys: Vec<String>,
    /// Matching items (empty for keys-only queries).
    pub items: Vec<FeedItem>,
}

/// Contract over the external document store.
///
/// All operations may fail transiently; the adapter does not retry.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Fetch a single item by its key.
    async fn get_by_key(&self, key: &str) -> Result<Option<FeedItem>, StoreError>;

    /// Upsert a batch of items under the given keys.
    ///
    /// `keys` and `items` must have equal length.
    async fn put_many(&self, keys: &[String], items: &[FeedItem]) -> Result<(), StoreError>;

    /// Delete a batch of records by key. Missing keys are ignored.
    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Run a filtered query.
    async fn query(&self, query: &ItemQuery) -> Result<QueryPage, StoreError>;

    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_op_matches_strings() {
        assert!(CompareOp::Eq.matches("a", "a"));
        assert!(CompareOp::Gt.matches("b", "a"));
        assert!(CompareOp::Ge.matches("a", "a"));
        assert!(CompareOp::Lt.matches("a", "b"));
        assert!(CompareOp::Le.matches("a", "a"));
        assert!(!CompareOp::Gt.matches("a", "b"));
    }

    #[test]
    fn test_compare_op_orders_rfc3339_dates() {
        // UTC-normalized RFC 3339 strings sort chronologically.
        assert!(CompareOp::Lt.matches("2025-01-01T00:00:00Z", "2025-06-01T00:00:00Z"));
        assert!(CompareOp::Ge.matches("2025-06-01T12:00:00Z", "2025-06-01T00:00:00Z"));
    }

    #[test]
    fn test_query_builder() {
        let q = ItemQuery::new()
            .filter(Field::Author, CompareOp::Eq, "A")
            .order_by_pub_date_desc()
            .limit(10)
            .offset(5)
            .keys_only();

        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.order, Some(OrderBy::PubDateDesc));
        assert_eq!(q.limit, Some(10));
        assert_eq!(q.offset, 5);
        assert!(q.keys_only);
    }
}
