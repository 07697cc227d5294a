//! feedstore - RSS/Atom ingestion backend
//!
//! Fetches syndication feeds, deduplicates and persists their items
//! into a key-addressable document store, and serves paginated,
//! filtered reads over HTTP.

pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod logging;
pub mod ratelimit;
pub mod store;
pub mod web;
pub mod worker;

pub use cache::FeedCache;
pub use config::Config;
pub use error::{FeedstoreError, Result};
pub use feed::{FeedItem, FetchFeed, HttpFeedFetcher};
pub use ingest::{IngestService, ItemReader, ItemWriter};
pub use store::{Datastore, InMemoryStore, SqliteStore};
pub use web::{ApiServer, AppState};
pub use worker::WorkerPool;
