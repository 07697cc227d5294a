//! Shared helpers for API integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use feedstore::feed::FetchFeed;
use feedstore::store::{Datastore, InMemoryStore};
use feedstore::{ApiServer, AppState, Config, FeedItem, FeedstoreError, Result};

/// Deterministic fetcher for tests.
pub struct StubFetcher {
    /// Items returned per fetch.
    pub items_per_feed: usize,
    /// Fail every fetch with an upstream error.
    pub fail: bool,
}

impl Default for StubFetcher {
    fn default() -> Self {
        Self {
            items_per_feed: 3,
            fail: false,
        }
    }
}

#[async_trait]
impl FetchFeed for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        if self.fail {
            return Err(FeedstoreError::ExternalService(
                "upstream unreachable".to_string(),
            ));
        }
        Ok((0..self.items_per_feed)
            .map(|i| FeedItem {
                title: format!("Article {i}"),
                link: format!("{url}/article/{i}"),
                description: format!("Description of article {i}"),
                author: "Test Author".to_string(),
                pub_date: format!("2025-06-01T{:02}:00:00Z", i % 24),
            })
            .collect())
    }
}

/// A running test server and its state.
pub struct TestApp {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

/// Test configuration: port 0, permissive rate limits.
pub fn test_config() -> Config {
    let mut config = Config {
        project_id: "test".to_string(),
        ..Config::default()
    };
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.rate_limit.requests_per_minute = 100_000;
    config.rate_limit.burst = 10_000;
    config.sources_path = "data/feeds.json".to_string();
    config
}

/// Spawn a server over an in-memory store and the given fetcher.
pub async fn spawn_app_with(config: Config, fetcher: Arc<dyn FetchFeed>) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let state = AppState::build(config, store, fetcher);

    let server = ApiServer::new(Arc::clone(&state));
    let addr = server.run_with_addr().await.expect("server must start");

    TestApp {
        addr,
        state,
        client: reqwest::Client::new(),
    }
}

/// Spawn a server with the default stub fetcher.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), Arc::new(StubFetcher::default())).await
}

/// Seed the store with `count` items spread across two authors.
pub async fn seed_items(app: &TestApp, count: usize) {
    let items: Vec<FeedItem> = (0..count)
        .map(|i| FeedItem {
            title: format!(
                "{} story {i}",
                if i % 2 == 0 { "alpha" } else { "beta" }
            ),
            link: format!("https://seeded.example/{i:04}"),
            description: format!("Seeded description {i}"),
            author: if i % 3 == 0 { "alice" } else { "bob" }.to_string(),
            pub_date: format!("2025-05-{:02}T{:02}:{:02}:00Z", 1 + i / 1440, (i / 60) % 24, i % 60),
        })
        .collect();
    let keys: Vec<String> = items.iter().map(|i| i.link.clone()).collect();
    app.state
        .store
        .put_many(&keys, &items)
        .await
        .expect("seeding must succeed");
}
