use std::sync::Arc;

use tracing::{error, info};

use feedstore::cache::SWEEP_INTERVAL;
use feedstore::{ApiServer, AppState, Config, HttpFeedFetcher, SqliteStore};

fn main() {
    let config = Config::from_env();

    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = feedstore::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        feedstore::logging::init_console_only(&config.logging.level);
    }

    info!("feedstore - RSS ingestion backend");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    if let Err(e) = rt.block_on(run_server(config)) {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}

async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("data")?;
    let db_path = format!("data/{}.db", config.project_id);
    let store = Arc::new(SqliteStore::connect(&db_path).await?);
    info!(project_id = %config.project_id, db_path = %db_path, "Datastore opened");

    let fetcher = Arc::new(HttpFeedFetcher::new()?);

    let state = AppState::build(config.clone(), store, fetcher);
    state.cache.start_sweeper(SWEEP_INTERVAL);
    state.limiter.start_eviction_task(config.rate_limit.cleanup_interval);

    let server = ApiServer::new(Arc::clone(&state));

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    state.pool.shutdown().await;
    state.cache.shutdown();
    info!("Server stopped");

    Ok(())
}
