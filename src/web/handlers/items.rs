//! `GET /items` and `GET /items/legacy` — paginated reads of stored
//! items.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::feed::FeedItem;
use crate::ingest::{ItemsFilter, ItemsQuery};
use crate::web::dto::ItemsParams;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::RequestId;

/// Paginated, filtered item listing.
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(params): Query<ItemsParams>,
) -> Result<Response, ApiError> {
    let limit = parse_number(params.limit.as_deref(), "limit", &request_id)?;
    let offset = parse_number(params.offset.as_deref(), "offset", &request_id)?;

    let date_from = normalize_date(params.date_from.as_deref(), "date_from", &request_id)?;
    let date_to = normalize_date(params.date_to.as_deref(), "date_to", &request_id)?;

    let query = ItemsQuery {
        limit,
        offset: offset.unwrap_or(0),
        cursor: params.cursor.clone(),
        filter: ItemsFilter {
            source: params.source.clone(),
            author: params.author.clone(),
            date_from,
            date_to,
            keyword: params.keyword.clone(),
        },
    };

    tracing::info!(
        request_id = %request_id,
        limit = ?query.limit,
        offset = query.offset,
        cursor = query.cursor.as_deref().unwrap_or(""),
        source = query.filter.source.as_deref().unwrap_or(""),
        author = query.filter.author.as_deref().unwrap_or(""),
        keyword = query.filter.keyword.as_deref().unwrap_or(""),
        "Processing items request"
    );

    let (page, cache_status) = state
        .reader
        .fetch(&query)
        .await
        .map_err(|e| ApiError::from_error(&e, &request_id))?;

    let mut response = Json(page).into_response();
    response
        .headers_mut()
        .insert("x-cache", HeaderValue::from_static(cache_status.as_str()));

    Ok(response)
}

/// Unfiltered listing of up to 1000 newest items.
pub async fn list_items_legacy(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<Vec<FeedItem>>, ApiError> {
    let items = state
        .reader
        .fetch_legacy()
        .await
        .map_err(|e| ApiError::from_error(&e, &request_id))?;

    Ok(Json(items))
}

fn parse_number(
    value: Option<&str>,
    name: &str,
    request_id: &str,
) -> Result<Option<usize>, ApiError> {
    match value {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|e| {
            ApiError::bad_request(request_id, format!("invalid {name} parameter: {e}"))
        }),
    }
}

/// Validate an RFC 3339 bound and normalize it to the stored `Z` form
/// so the string comparison against `pub_date` stays correct.
fn normalize_date(
    value: Option<&str>,
    name: &str,
    request_id: &str,
) -> Result<Option<String>, ApiError> {
    match value {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| {
                Some(
                    dt.with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                )
            })
            .map_err(|e| {
                ApiError::bad_request(
                    request_id,
                    format!("invalid {name} parameter, expected RFC 3339 format: {e}"),
                )
            }),
    }
}
