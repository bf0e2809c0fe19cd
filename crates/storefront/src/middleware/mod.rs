//! HTTP middleware stack for the storefront API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Customer identity is not a layer: routes that need it take the
//! [`CustomerRef`] extractor.

pub mod customer_ref;
pub mod request_id;

pub use customer_ref::CustomerRef;
pub use request_id::request_id_middleware;
