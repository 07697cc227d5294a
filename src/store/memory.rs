//! In-memory document store.
//!
//! Backs tests and local development with the full query semantics of
//! the adapter contract.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::feed::FeedItem;

use super::{Datastore, Field, ItemQuery, OrderBy, QueryPage, StoreError};

/// In-memory store keyed by item link.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, FeedItem>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn field_value<'a>(item: &'a FeedItem, field: Field) -> &'a str {
        match field {
            Field::Link => &item.link,
            Field::Author => &item.author,
            Field::PubDate => &item.pub_date,
        }
    }

    fn matches(item: &FeedItem, query: &ItemQuery) -> bool {
        query
            .filters
            .iter()
            .all(|f| f.op.matches(Self::field_value(item, f.field), &f.value))
    }
}

#[async_trait]
impl Datastore for InMemoryStore {
    async fn get_by_key(&self, key: &str) -> Result<Option<FeedItem>, StoreError> {
        Ok(self.records.read().unwrap().get(key).cloned())
    }

    async fn put_many(&self, keys: &[String], items: &[FeedItem]) -> Result<(), StoreError> {
        if keys.len() != items.len() {
            return Err(StoreError::Backend(format!(
                "key/item length mismatch: {} != {}",
                keys.len(),
                items.len()
            )));
        }

        let mut records = self.records.write().unwrap();
        for (key, item) in keys.iter().zip(items.iter()) {
            records.insert(key.clone(), item.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        for key in keys {
            records.remove(key);
        }
        Ok(())
    }

    async fn query(&self, query: &ItemQuery) -> Result<QueryPage, StoreError> {
        let records = self.records.read().unwrap();

        let mut matching: Vec<&FeedItem> = records
            .values()
            .filter(|item| Self::matches(item, query))
            .collect();

        if let Some(OrderBy::PubDateDesc) = query.order {
            matching.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
        }

        let page: Vec<&FeedItem> = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        let keys = page.iter().map(|item| item.link.clone()).collect();
        let items = if query.keys_only {
            Vec::new()
        } else {
            page.into_iter().cloned().collect()
        };

        Ok(QueryPage { keys, items })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
