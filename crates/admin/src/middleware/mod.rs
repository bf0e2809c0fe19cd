//! HTTP middleware and extractors for the admin console.
//!
//! [`RequireApiToken`] is an extractor, not a layer: each handler names
//! it as an argument, so an unguarded route is visible in its
//! signature.

pub mod auth;

pub use auth::RequireApiToken;
