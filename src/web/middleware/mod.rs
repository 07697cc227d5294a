//! Middleware for the HTTP surface.

pub mod cors;
pub mod rate_limit;
pub mod request_id;

pub use cors::create_cors_layer;
pub use rate_limit::rate_limit_middleware;
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
