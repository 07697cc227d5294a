//! HTTP API for feedstore.
//!
//! Axum router, handlers, middleware and the JSON wire types for the
//! ingestion and read endpoints.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::{ApiError, ErrorCode};
pub use handlers::AppState;
pub use router::create_router;
pub use server::ApiServer;
