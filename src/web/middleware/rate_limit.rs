//! Rate limiting middleware.
//!
//! Fingerprints each request and consults the per-client token bucket
//! registry before letting it through. Health endpoints bypass
//! admission so orchestrators can always probe.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::ratelimit::{client_fingerprint, RateLimiterRegistry};
use crate::web::error::ApiError;
use crate::web::middleware::request_id::RequestId;

/// Admit or reject the request based on its client's bucket.
pub async fn rate_limit_middleware(
    limiter: Arc<RateLimiterRegistry>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path().starts_with("/health") {
        return next.run(request).await;
    }

    let peer_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let client_id = client_fingerprint(request.headers(), peer_ip.as_deref());

    if !limiter.allow(&client_id) {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();

        tracing::warn!(client_id = %client_id, request_id = %request_id, "Rate limit exceeded");
        return ApiError::rate_limited(&request_id).into_response();
    }

    next.run(request).await
}
