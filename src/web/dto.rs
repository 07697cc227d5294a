//! Request and response DTOs for the HTTP surface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::feed::FeedItem;
use crate::ingest::{CacheStatus, FetchOutcome};

/// Body of `POST /fetch-store`.
#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    /// Feed URL to fetch.
    pub url: String,
    /// Process asynchronously through the worker pool.
    #[serde(default, rename = "async")]
    pub run_async: bool,
    /// Skip the cache probe and fetch fresh.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Response of `POST /fetch-store`.
#[derive(Debug, Serialize)]
pub struct FetchResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Fetched items (sync path only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<FeedItem>>,
    /// Job id (async path only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Request correlation id.
    pub request_id: String,
    /// Number of items returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_count: Option<usize>,
    /// Items newly written to the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_count: Option<usize>,
    /// Where the items came from (`cache` or `live`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
    /// Cache verdict (`HIT` or `MISS`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<&'static str>,
    /// Submission status (async path only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
}

impl FetchResponse {
    /// Response for a completed synchronous fetch.
    pub fn fetched(outcome: FetchOutcome, request_id: String) -> Self {
        Self {
            success: true,
            message: "RSS feed processed successfully".to_string(),
            items_count: Some(outcome.items.len()),
            new_count: Some(outcome.new_count),
            source: Some(match outcome.cache {
                CacheStatus::Hit => "cache",
                CacheStatus::Miss => "live",
            }),
            cache: Some(outcome.cache.as_str()),
            data: Some(outcome.items),
            job_id: None,
            request_id,
            status: None,
        }
    }

    /// Response for an accepted asynchronous submission.
    pub fn submitted(job_id: String, request_id: String) -> Self {
        Self {
            success: true,
            message: "Job submitted for async processing".to_string(),
            data: None,
            job_id: Some(job_id),
            request_id,
            items_count: None,
            new_count: None,
            source: None,
            cache: None,
            status: Some("submitted"),
        }
    }
}

/// Raw query parameters of `GET /items`.
///
/// Numbers arrive as strings so malformed values produce the API's own
/// error envelope instead of the extractor's.
#[derive(Debug, Default, Deserialize)]
pub struct ItemsParams {
    /// Page size.
    pub limit: Option<String>,
    /// Matching records to skip.
    pub offset: Option<String>,
    /// Opaque pagination cursor.
    pub cursor: Option<String>,
    /// Link prefix filter.
    pub source: Option<String>,
    /// Exact author filter.
    pub author: Option<String>,
    /// Lower publication-date bound (RFC 3339).
    pub date_from: Option<String>,
    /// Upper publication-date bound (RFC 3339).
    pub date_to: Option<String>,
    /// Keyword filter on title/description.
    pub keyword: Option<String>,
}

/// Query parameters of `GET /job-status`.
#[derive(Debug, Deserialize)]
pub struct JobStatusParams {
    /// Job id to look up.
    pub job_id: Option<String>,
}

/// Body of the health endpoints.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall verdict.
    pub status: &'static str,
    /// When the probe ran (RFC 3339, UTC).
    pub timestamp: String,
    /// Service version.
    pub version: &'static str,
    /// Per-dependency verdicts.
    pub services: HashMap<String, String>,
    /// Time since process start.
    pub uptime: String,
}
