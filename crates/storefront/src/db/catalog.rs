//! Catalog reads and the atomic stock primitive.
//!
//! Simple products and variants live in separate tables but are addressed
//! uniformly through [`ItemRef`]; every method here dispatches on the kind
//! and applies the same semantics to both.

use marram_goods_core::{ItemRef, ProductId, VariantId};
use rust_decimal::Decimal;

use super::{PgStore, RepositoryError};
use crate::models::catalog::CatalogItem;

/// Catalog storage: price/stock resolution and conditional decrements.
#[allow(async_fn_in_trait)]
pub trait CatalogStore: Send + Sync {
    /// Resolve an item reference to its current price, stock, and display
    /// data. Variant display name and image fall back to the parent
    /// product's when absent. `None` if the reference points nowhere.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn resolve_item(&self, item: ItemRef) -> Result<Option<CatalogItem>, RepositoryError>;

    /// Atomically decrement stock if and only if at least `quantity` units
    /// remain. Returns `true` when the decrement applied.
    ///
    /// This is the single primitive that prevents overselling: the check
    /// and the write are one conditional update, never a read followed by
    /// a write.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn try_decrement_stock(
        &self,
        item: ItemRef,
        quantity: i32,
    ) -> Result<bool, RepositoryError>;

    /// Compensating increment, used to roll back a partially committed
    /// reservation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn increment_stock(&self, item: ItemRef, quantity: i32) -> Result<(), RepositoryError>;

    /// Current stock for an item, `0` if the item no longer exists.
    /// Used to report how much is still available after a rejection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn available_stock(&self, item: ItemRef) -> Result<i32, RepositoryError>;
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ResolvedProductRow {
    id: i32,
    name: String,
    image_url: Option<String>,
    price: Decimal,
    stock: i32,
}

impl From<ResolvedProductRow> for CatalogItem {
    fn from(row: ResolvedProductRow) -> Self {
        Self {
            item: ItemRef::Simple(ProductId::new(row.id)),
            display_name: row.name,
            image_url: row.image_url,
            unit_price: row.price,
            stock: row.stock,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ResolvedVariantRow {
    id: i32,
    variant_name: Option<String>,
    size: String,
    color: String,
    variant_image_url: Option<String>,
    parent_name: String,
    parent_image_url: Option<String>,
    price: Decimal,
    stock: i32,
}

impl From<ResolvedVariantRow> for CatalogItem {
    fn from(row: ResolvedVariantRow) -> Self {
        let display_name = row
            .variant_name
            .unwrap_or_else(|| format!("{} ({} / {})", row.parent_name, row.size, row.color));
        Self {
            item: ItemRef::Variant(VariantId::new(row.id)),
            display_name,
            image_url: row.variant_image_url.or(row.parent_image_url),
            unit_price: row.price,
            stock: row.stock,
        }
    }
}

// =============================================================================
// PgStore implementation
// =============================================================================

impl CatalogStore for PgStore {
    async fn resolve_item(&self, item: ItemRef) -> Result<Option<CatalogItem>, RepositoryError> {
        match item {
            ItemRef::Simple(id) => {
                let row = sqlx::query_as::<_, ResolvedProductRow>(
                    r"
                    SELECT id, name, image_url, price, stock
                    FROM products
                    WHERE id = $1
                    ",
                )
                .bind(id.as_i32())
                .fetch_optional(self.pool())
                .await?;

                Ok(row.map(Into::into))
            }
            ItemRef::Variant(id) => {
                let row = sqlx::query_as::<_, ResolvedVariantRow>(
                    r"
                    SELECT
                        v.id,
                        v.name AS variant_name,
                        v.size,
                        v.color,
                        v.image_url AS variant_image_url,
                        p.name AS parent_name,
                        p.image_url AS parent_image_url,
                        v.price,
                        v.stock
                    FROM product_variants v
                    INNER JOIN products p ON p.id = v.product_id
                    WHERE v.id = $1
                    ",
                )
                .bind(id.as_i32())
                .fetch_optional(self.pool())
                .await?;

                Ok(row.map(Into::into))
            }
        }
    }

    async fn try_decrement_stock(
        &self,
        item: ItemRef,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = match item {
            ItemRef::Simple(id) => {
                sqlx::query(
                    r"
                    UPDATE products
                    SET stock = stock - $2, updated_at = now()
                    WHERE id = $1 AND stock >= $2
                    ",
                )
                .bind(id.as_i32())
                .bind(quantity)
                .execute(self.pool())
                .await?
            }
            ItemRef::Variant(id) => {
                sqlx::query(
                    r"
                    UPDATE product_variants
                    SET stock = stock - $2, updated_at = now()
                    WHERE id = $1 AND stock >= $2
                    ",
                )
                .bind(id.as_i32())
                .bind(quantity)
                .execute(self.pool())
                .await?
            }
        };

        Ok(result.rows_affected() == 1)
    }

    async fn increment_stock(&self, item: ItemRef, quantity: i32) -> Result<(), RepositoryError> {
        match item {
            ItemRef::Simple(id) => {
                sqlx::query(
                    r"
                    UPDATE products
                    SET stock = stock + $2, updated_at = now()
                    WHERE id = $1
                    ",
                )
                .bind(id.as_i32())
                .bind(quantity)
                .execute(self.pool())
                .await?;
            }
            ItemRef::Variant(id) => {
                sqlx::query(
                    r"
                    UPDATE product_variants
                    SET stock = stock + $2, updated_at = now()
                    WHERE id = $1
                    ",
                )
                .bind(id.as_i32())
                .bind(quantity)
                .execute(self.pool())
                .await?;
            }
        }

        Ok(())
    }

    async fn available_stock(&self, item: ItemRef) -> Result<i32, RepositoryError> {
        let stock: Option<(i32,)> = match item {
            ItemRef::Simple(id) => {
                sqlx::query_as(r"SELECT stock FROM products WHERE id = $1")
                    .bind(id.as_i32())
                    .fetch_optional(self.pool())
                    .await?
            }
            ItemRef::Variant(id) => {
                sqlx::query_as(r"SELECT stock FROM product_variants WHERE id = $1")
                    .bind(id.as_i32())
                    .fetch_optional(self.pool())
                    .await?
            }
        };

        Ok(stock.map_or(0, |(s,)| s))
    }
}
