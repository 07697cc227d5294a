//! Health, liveness and readiness endpoints.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{SecondsFormat, Utc};

use crate::store::Datastore;
use crate::web::dto::HealthStatus;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::RequestId;

/// Deadline for the store connectivity probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Service version reported by the health endpoints.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Full health report with per-dependency verdicts.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let mut services = HashMap::new();

    let healthy = match probe_store(&state).await {
        Ok(()) => {
            services.insert("datastore".to_string(), "healthy".to_string());
            true
        }
        Err(detail) => {
            tracing::error!(service = "datastore", error = %detail, "Health probe failed");
            services.insert("datastore".to_string(), format!("unhealthy: {detail}"));
            false
        }
    };

    let body = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" },
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        version: VERSION,
        services,
        uptime: format_uptime(state.started_at.elapsed()),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body)).into_response()
}

/// Liveness probe; never touches dependencies.
pub async fn health_live(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "uptime": format_uptime(state.started_at.elapsed()),
    }))
}

/// Readiness probe; answers 503 while the store is unreachable.
pub async fn health_ready(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    probe_store(&state)
        .await
        .map_err(|detail| ApiError::service_unavailable(&request_id, detail))?;

    Ok(Json(serde_json::json!({
        "status": "ready",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "services": { "datastore": "ready" },
    })))
}

async fn probe_store(state: &AppState) -> Result<(), String> {
    match tokio::time::timeout(PROBE_TIMEOUT, state.store.ping()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("probe timed out after {PROBE_TIMEOUT:?}")),
    }
}

fn format_uptime(elapsed: Duration) -> String {
    format!("{}s", elapsed.as_secs())
}
