//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (`http_request` span)
//! 3. Request ID (propagate or generate `x-request-id`)
//! 4. CORS (answers preflight before routing)

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
