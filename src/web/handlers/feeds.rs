//! `GET /feeds` — predefined feed sources.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::feed::FeedSource;
use crate::web::handlers::AppState;

/// List the predefined feed sources.
pub async fn list_feeds(State(state): State<Arc<AppState>>) -> Json<Vec<FeedSource>> {
    Json(state.sources.clone())
}
