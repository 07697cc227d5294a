//! `POST /fetch-store` — fetch a feed and persist its items.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use crate::feed::validate_feed_url;
use crate::web::dto::{FetchRequest, FetchResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::RequestId;

/// Fetch a feed synchronously, or submit it to the worker pool.
pub async fn fetch_store(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Result<Json<FetchRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body
        .map_err(|e| ApiError::bad_request(&request_id, format!("invalid request body: {e}")))?;

    if request.url.is_empty() {
        return Err(ApiError::bad_request(&request_id, "url field is required"));
    }

    let url = validate_feed_url(&request.url)
        .map_err(|e| ApiError::from_error(&e, &request_id))?;

    if request.run_async {
        let job_id = state
            .pool
            .submit(&url, &request_id)
            .await
            .map_err(|e| ApiError::from_error(&e, &request_id))?;

        let response = FetchResponse::submitted(job_id, request_id);
        return Ok((StatusCode::ACCEPTED, Json(response)).into_response());
    }

    tracing::info!(
        request_id = %request_id,
        url = %url,
        force_refresh = request.force_refresh,
        "Processing feed request"
    );

    let outcome = state
        .ingest
        .fetch_and_store(&url, request.force_refresh)
        .await
        .map_err(|e| ApiError::from_error(&e, &request_id))?;

    let cache_verdict = outcome.cache.as_str();
    let mut response =
        (StatusCode::OK, Json(FetchResponse::fetched(outcome, request_id))).into_response();
    response
        .headers_mut()
        .insert("x-cache", HeaderValue::from_static(cache_verdict));

    Ok(response)
}
