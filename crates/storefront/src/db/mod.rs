//! Database operations for the commerce `PostgreSQL` database.
//!
//! # Database: `marram_commerce`
//!
//! ## Tables
//!
//! - `products` - Simple catalog items with price and stock
//! - `product_variants` - Option rows (size, color) with their own price and stock
//! - `coupons` - Percentage-off codes with validity windows and usage ceilings
//! - `cart_lines` - Per-customer cart contents (tagged union over item kind)
//! - `payment_intents` - Single-use gateway intents with the priced quote snapshot
//! - `orders` / `order_lines` - Committed orders and denormalized line snapshots
//! - `payment_incidents` - Captured-but-uncommitted payment records for manual review
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p marram-goods-cli -- migrate
//! ```
//!
//! # Storage traits
//!
//! Every concern is defined as a trait (`CatalogStore`, `CouponStore`, ...)
//! with two implementations: [`PgStore`] against `PostgreSQL` and
//! [`MemoryStore`] with the same compare-and-swap semantics for tests. The
//! checkout pipeline is written against [`CommerceStore`], never a concrete
//! database.

pub mod carts;
pub mod catalog;
pub mod coupons;
pub mod incidents;
pub mod intents;
pub mod memory;
pub mod orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartStore;
pub use catalog::CatalogStore;
pub use coupons::CouponStore;
pub use incidents::IncidentStore;
pub use intents::IntentStore;
pub use memory::MemoryStore;
pub use orders::{OrderInsertError, OrderStore};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate order token).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Everything the checkout pipeline needs from storage.
///
/// Blanket-implemented for any type that provides all the concern traits,
/// so `PgStore` and `MemoryStore` qualify automatically.
pub trait CommerceStore:
    CatalogStore + CouponStore + CartStore + IntentStore + OrderStore + IncidentStore
{
}

impl<T> CommerceStore for T where
    T: CatalogStore + CouponStore + CartStore + IntentStore + OrderStore + IncidentStore
{
}

/// `PostgreSQL`-backed store. Cheap to clone; wraps a connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for health checks.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
