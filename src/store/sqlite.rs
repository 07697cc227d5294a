//! SQLite-backed document store.
//!
//! Stores one row per feed item in a flat `feed_items` table keyed by
//! `link`, and translates the adapter's conjunctive filter queries into
//! bound SQL.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::feed::FeedItem;

use super::{Datastore, ItemQuery, OrderBy, QueryPage, StoreError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS feed_items (
    link        TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    author      TEXT NOT NULL DEFAULT '',
    pub_date    TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_feed_items_pub_date ON feed_items (pub_date);
CREATE INDEX IF NOT EXISTS idx_feed_items_author ON feed_items (author);";

/// SQLite document store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Open an in-memory database (tests, local development).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        // A pool of one keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<FeedItem, StoreError> {
        Ok(FeedItem {
            link: Self::column(row, "link")?,
            title: Self::column(row, "title")?,
            description: Self::column(row, "description")?,
            author: Self::column(row, "author")?,
            pub_date: Self::column(row, "pub_date")?,
        })
    }

    fn column(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<String, StoreError> {
        row.try_get(name)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl Datastore for SqliteStore {
    async fn get_by_key(&self, key: &str) -> Result<Option<FeedItem>, StoreError> {
        let row = sqlx::query(
            "SELECT link, title, description, author, pub_date FROM feed_items WHERE link = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn put_many(&self, keys: &[String], items: &[FeedItem]) -> Result<(), StoreError> {
        if keys.len() != items.len() {
            return Err(StoreError::Backend(format!(
                "key/item length mismatch: {} != {}",
                keys.len(),
                items.len()
            )));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        for (key, item) in keys.iter().zip(items.iter()) {
            sqlx::query(
                "INSERT INTO feed_items (link, title, description, author, pub_date)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(link) DO UPDATE SET
                   title = excluded.title,
                   description = excluded.description,
                   author = excluded.author,
                   pub_date = excluded.pub_date",
            )
            .bind(key)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.author)
            .bind(&item.pub_date)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        for key in keys {
            sqlx::query("DELETE FROM feed_items WHERE link = ?")
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn query(&self, query: &ItemQuery) -> Result<QueryPage, StoreError> {
        let mut sql = if query.keys_only {
            String::from("SELECT link FROM feed_items")
        } else {
            String::from("SELECT link, title, description, author, pub_date FROM feed_items")
        };

        if !query.filters.is_empty() {
            let clauses: Vec<String> = query
                .filters
                .iter()
                .map(|f| format!("{} {} ?", f.field.as_str(), f.op.as_sql()))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some(OrderBy::PubDateDesc) = query.order {
            sql.push_str(" ORDER BY pub_date DESC");
        }

        if query.limit.is_some() || query.offset > 0 {
            sql.push_str(" LIMIT ? OFFSET ?");
        }

        let mut stmt = sqlx::query(&sql);
        for f in &query.filters {
            stmt = stmt.bind(&f.value);
        }
        if query.limit.is_some() || query.offset > 0 {
            // LIMIT -1 means unbounded in SQLite.
            stmt = stmt
                .bind(query.limit.map(|l| l as i64).unwrap_or(-1))
                .bind(query.offset as i64);
        }

        let rows = stmt
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut keys = Vec::with_capacity(rows.len());
        let mut items = Vec::new();
        for row in &rows {
            keys.push(Self::column(row, "link")?);
            if !query.keys_only {
                items.push(Self::row_to_item(row)?);
            }
        }

        Ok(QueryPage { keys, items })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}
