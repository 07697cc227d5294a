//! Router configuration for the HTTP API.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    fetch_store, health, health_live, health_ready, job_status, list_feeds, list_items,
    list_items_legacy, AppState,
};
use super::middleware::{create_cors_layer, rate_limit_middleware, request_id_middleware};

/// Create the API router with its middleware stack.
pub fn create_router(state: Arc<AppState>) -> Router {
    let limiter = Arc::clone(&state.limiter);
    let cors = create_cors_layer(state.config.cors.allowed_origins());

    Router::new()
        .route("/fetch-store", post(fetch_store))
        .route("/feeds", get(list_feeds))
        .route("/items", get(list_items))
        .route("/items/legacy", get(list_items_legacy))
        .route("/job-status", get(job_status))
        .route("/health", get(health))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn(request_id_middleware))
                .layer(middleware::from_fn(move |request, next| {
                    let limiter = Arc::clone(&limiter);
                    rate_limit_middleware(limiter, request, next)
                })),
        )
        .with_state(state)
}
