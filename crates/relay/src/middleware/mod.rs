//! HTTP middleware for the relay.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with method, uri, status and latency)
//! 3. Request ID (add unique ID to each request)

pub mod auth;
pub mod request_id;

pub use auth::RequireUser;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
