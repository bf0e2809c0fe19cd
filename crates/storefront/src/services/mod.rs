//! Business logic for the checkout pipeline.
//!
//! - `cart` - cart pricing against the live catalog
//! - `checkout` - quotes, payment intents, and order commits
//! - `display_cache` - cached item names and images for cart rendering
//! - `email` - order confirmation delivery over SMTP
//! - `stock` - atomic stock reservation with rollback

pub mod cart;
pub mod checkout;
pub mod display_cache;
pub mod email;
pub mod stock;
