//! Cart line storage.
//!
//! Carts are keyed by the caller-supplied owner reference; a cart is
//! simply the set of lines under one owner. Adding an item that is
//! already in the cart merges quantities instead of creating a second
//! line, enforced by a unique index on (owner, item).

use chrono::{DateTime, Utc};
use marram_goods_core::{CartLineId, ItemKind, ItemRef, OwnerId};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{PgStore, RepositoryError};
use crate::models::cart::CartLine;

/// Cart storage: list, merge-on-add upsert, quantity updates, removal.
#[allow(async_fn_in_trait)]
pub trait CartStore: Send + Sync {
    /// All lines in an owner's cart, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored line is invalid.
    async fn list_lines(&self, owner: OwnerId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Add an item to the cart. If the owner already has a line for this
    /// item the quantities are merged and the captured unit price is
    /// refreshed; otherwise a new line is created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored line is invalid.
    async fn upsert_line(
        &self,
        owner: OwnerId,
        item: ItemRef,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<CartLine, RepositoryError>;

    /// Replace the quantity of one line. `None` if the line does not
    /// exist or belongs to a different owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored line is invalid.
    async fn set_quantity(
        &self,
        owner: OwnerId,
        line_id: CartLineId,
        quantity: i32,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Delete one line. Returns `false` if the line does not exist or
    /// belongs to a different owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn remove_line(
        &self,
        owner: OwnerId,
        line_id: CartLineId,
    ) -> Result<bool, RepositoryError>;

    /// Delete every line in an owner's cart. Called after an order is
    /// placed; a cart that is already empty is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn clear_cart(&self, owner: OwnerId) -> Result<(), RepositoryError>;
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    owner_id: Uuid,
    item_kind: String,
    product_id: Option<i32>,
    variant_id: Option<i32>,
    quantity: i32,
    unit_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let kind: ItemKind = row.item_kind.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid item kind in cart line: {e}"))
        })?;
        let raw_id = match kind {
            ItemKind::Simple => row.product_id,
            ItemKind::Variant => row.variant_id,
        }
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "cart line {} has no id for kind {kind}",
                row.id
            ))
        })?;

        Ok(Self {
            id: CartLineId::new(row.id),
            owner_id: OwnerId::from(row.owner_id),
            item: ItemRef::from_parts(kind, raw_id),
            quantity: row.quantity,
            unit_price: row.unit_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// PgStore implementation
// =============================================================================

impl CartStore for PgStore {
    async fn list_lines(&self, owner: OwnerId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT id, owner_id, item_kind, product_id, variant_id,
                   quantity, unit_price, created_at, updated_at
            FROM cart_lines
            WHERE owner_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(owner.as_uuid())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn upsert_line(
        &self,
        owner: OwnerId,
        item: ItemRef,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<CartLine, RepositoryError> {
        let (product_id, variant_id) = match item {
            ItemRef::Simple(id) => (Some(id.as_i32()), None),
            ItemRef::Variant(id) => (None, Some(id.as_i32())),
        };

        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            INSERT INTO cart_lines (owner_id, item_kind, product_id, variant_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (owner_id, item_kind, coalesce(product_id, 0), coalesce(variant_id, 0))
            DO UPDATE SET
                quantity = cart_lines.quantity + EXCLUDED.quantity,
                unit_price = EXCLUDED.unit_price,
                updated_at = now()
            RETURNING id, owner_id, item_kind, product_id, variant_id,
                      quantity, unit_price, created_at, updated_at
            ",
        )
        .bind(owner.as_uuid())
        .bind(item.kind().to_string())
        .bind(product_id)
        .bind(variant_id)
        .bind(quantity)
        .bind(unit_price)
        .fetch_one(self.pool())
        .await?;

        row.try_into()
    }

    async fn set_quantity(
        &self,
        owner: OwnerId,
        line_id: CartLineId,
        quantity: i32,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            UPDATE cart_lines
            SET quantity = $3, updated_at = now()
            WHERE id = $1 AND owner_id = $2
            RETURNING id, owner_id, item_kind, product_id, variant_id,
                      quantity, unit_price, created_at, updated_at
            ",
        )
        .bind(line_id.as_i32())
        .bind(owner.as_uuid())
        .bind(quantity)
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn remove_line(
        &self,
        owner: OwnerId,
        line_id: CartLineId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(r"DELETE FROM cart_lines WHERE id = $1 AND owner_id = $2")
            .bind(line_id.as_i32())
            .bind(owner.as_uuid())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_cart(&self, owner: OwnerId) -> Result<(), RepositoryError> {
        sqlx::query(r"DELETE FROM cart_lines WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .execute(self.pool())
            .await?;

        Ok(())
    }
}
