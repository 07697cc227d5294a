//! API error handling for the HTTP surface.
//!
//! Every failed request answers with the same JSON envelope:
//! `{error, message, details?, request_id, timestamp}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::FeedstoreError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request (400).
    BadRequest,
    /// Authentication required (401).
    Unauthorized,
    /// Permission denied (403).
    Forbidden,
    /// Unknown resource (404).
    NotFound,
    /// Client exceeded its request budget (429).
    RateLimited,
    /// Unexpected server failure (500).
    InternalError,
    /// Dependency unavailable or overloaded (503).
    ServiceUnavailable,
    /// Input failed validation (422).
    ValidationError,
    /// Upstream service failure (502).
    ExternalApiError,
}

impl ErrorCode {
    /// HTTP status code of this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::ExternalApiError => StatusCode::BAD_GATEWAY,
        }
    }

    /// User-facing message for this error code.
    fn message(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "The request is invalid or malformed",
            ErrorCode::Unauthorized => "Authentication is required to access this resource",
            ErrorCode::Forbidden => "You don't have permission to access this resource",
            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::RateLimited => "Rate limit exceeded. Please try again later",
            ErrorCode::InternalError => "An internal server error occurred",
            ErrorCode::ServiceUnavailable => "The service is temporarily unavailable",
            ErrorCode::ValidationError => "Request validation failed",
            ErrorCode::ExternalApiError => "Failed to communicate with external service",
        }
    }
}

/// Wire form of an API error.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error code.
    pub error: ErrorCode,
    /// User-facing message.
    pub message: String,
    /// Optional technical detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request correlation id.
    pub request_id: String,
    /// When the error occurred (RFC 3339, UTC).
    pub timestamp: String,
}

/// API error carrying its code, detail and request id.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    details: Option<String>,
    request_id: String,
}

impl ApiError {
    /// Create an error without detail text.
    pub fn new(code: ErrorCode, request_id: impl Into<String>) -> Self {
        Self {
            code,
            details: None,
            request_id: request_id.into(),
        }
    }

    /// Attach detail text.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// 400 with detail.
    pub fn bad_request(request_id: &str, details: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, request_id).with_details(details)
    }

    /// 404 with detail.
    pub fn not_found(request_id: &str, details: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, request_id).with_details(details)
    }

    /// 429.
    pub fn rate_limited(request_id: &str) -> Self {
        Self::new(ErrorCode::RateLimited, request_id)
    }

    /// 500 with detail.
    pub fn internal(request_id: &str, details: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, request_id).with_details(details)
    }

    /// 503 with detail.
    pub fn service_unavailable(request_id: &str, details: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, request_id).with_details(details)
    }

    /// Project a domain error onto its wire code.
    pub fn from_error(err: &FeedstoreError, request_id: &str) -> Self {
        let code = match err {
            FeedstoreError::Validation(_) | FeedstoreError::InvalidUrl(_) => {
                ErrorCode::ValidationError
            }
            FeedstoreError::ExternalService(_) => ErrorCode::ExternalApiError,
            FeedstoreError::NotFound(_) => ErrorCode::NotFound,
            FeedstoreError::Backpressure { .. }
            | FeedstoreError::SubmitTimeout(_)
            | FeedstoreError::PoolClosed => ErrorCode::ServiceUnavailable,
            FeedstoreError::Store(_) | FeedstoreError::Io(_) | FeedstoreError::Config(_) => {
                ErrorCode::InternalError
            }
        };
        Self::new(code, request_id).with_details(err.to_string())
    }

    /// The error's code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();

        tracing::warn!(
            error_code = ?self.code,
            status_code = status.as_u16(),
            request_id = %self.request_id,
            details = self.details.as_deref().unwrap_or(""),
            "Request failed"
        );

        let body = ErrorBody {
            error: self.code,
            message: self.code.message().to_string(),
            details: self.details,
            request_id: self.request_id,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.details.as_deref().unwrap_or(""))
    }
}

impl std::error::Error for ApiError {}
