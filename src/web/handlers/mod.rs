//! HTTP handlers and shared application state.

pub mod feeds;
pub mod fetch;
pub mod health;
pub mod items;
pub mod jobs;

pub use feeds::list_feeds;
pub use fetch::fetch_store;
pub use health::{health, health_live, health_ready};
pub use items::{list_items, list_items_legacy};
pub use jobs::job_status;

use std::sync::Arc;
use std::time::Instant;

use crate::cache::FeedCache;
use crate::config::Config;
use crate::feed::{load_sources, FeedSource, FetchFeed};
use crate::ingest::{IngestService, ItemReader};
use crate::ratelimit::RateLimiterRegistry;
use crate::store::Datastore;
use crate::worker::WorkerPool;

/// Shared state behind every handler.
///
/// The worker pool and the ingestion orchestrator are both built from
/// the same store/cache/fetcher capabilities; neither owns the other.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Document store adapter.
    pub store: Arc<dyn Datastore>,
    /// Feed and query-result cache.
    pub cache: Arc<FeedCache>,
    /// Ingestion orchestrator.
    pub ingest: Arc<IngestService>,
    /// Stored-item reader.
    pub reader: ItemReader,
    /// Asynchronous worker pool.
    pub pool: Arc<WorkerPool>,
    /// Request admission registry.
    pub limiter: Arc<RateLimiterRegistry>,
    /// Predefined feed sources.
    pub sources: Vec<FeedSource>,
    /// Process start time, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Wire the application state from its capabilities.
    ///
    /// Spawns the worker pool tasks; call from within a runtime.
    pub fn build(
        config: Config,
        store: Arc<dyn Datastore>,
        fetcher: Arc<dyn FetchFeed>,
    ) -> Arc<Self> {
        let cache = Arc::new(FeedCache::new(config.cache.clone()));
        let ingest = Arc::new(IngestService::new(
            fetcher,
            Arc::clone(&store),
            Arc::clone(&cache),
        ));
        let pool = WorkerPool::start(config.worker.clone(), Arc::clone(&ingest));
        let limiter = Arc::new(RateLimiterRegistry::new(&config.rate_limit));
        let reader = ItemReader::new(Arc::clone(&store), Arc::clone(&cache));
        let sources = load_sources(&config.sources_path);

        Arc::new(Self {
            config,
            store,
            cache,
            ingest,
            reader,
            pool,
            limiter,
            sources,
            started_at: Instant::now(),
        })
    }
}
