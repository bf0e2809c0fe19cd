//! Order reads and fulfillment transitions.
//!
//! Reads are unscoped: the console sees every customer's orders. The
//! transition is a compare-and-swap keyed on the status the operator
//! last saw, so two operators racing on the same order cannot silently
//! overwrite each other; the loser gets a conflict and reloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use marram_goods_core::{
    FulfillmentStatus, ItemKind, ItemRef, OrderId, OrderLineId, OwnerId, PaymentMethod,
    PaymentStatus,
};

use super::RepositoryError;
use crate::models::order::{Order, OrderLine};

/// Why a fulfillment transition was refused.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// No order with that token.
    #[error("order not found")]
    NotFound,

    /// The state machine forbids this move.
    #[error("cannot transition from {from} to {next}")]
    Invalid {
        from: FulfillmentStatus,
        next: FulfillmentStatus,
    },

    /// Another operator moved the order first. Reload and retry.
    #[error("order was updated concurrently")]
    Conflict,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    token: String,
    owner_id: Uuid,
    customer_email: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    shipping: Decimal,
    tax: Decimal,
    total: Decimal,
    coupon_code: Option<String>,
    payment_method: String,
    payment_status: String,
    fulfillment_status: String,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let payment_method: PaymentMethod = row.payment_method.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid payment method in database: {e}"))
        })?;
        let payment_status: PaymentStatus = row.payment_status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid payment status in database: {e}"))
        })?;
        let fulfillment_status: FulfillmentStatus =
            row.fulfillment_status.parse().map_err(|e| {
                RepositoryError::DataCorruption(format!(
                    "invalid fulfillment status in database: {e}"
                ))
            })?;

        Ok(Self {
            id: OrderId::new(row.id),
            token: row.token,
            owner_id: OwnerId::from(row.owner_id),
            customer_email: row.customer_email,
            subtotal: row.subtotal,
            discount: row.discount,
            shipping: row.shipping,
            tax: row.tax,
            total: row.total,
            coupon_code: row.coupon_code,
            payment_method,
            payment_status,
            fulfillment_status,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: i32,
    order_id: i32,
    item_kind: String,
    product_id: Option<i32>,
    variant_id: Option<i32>,
    display_name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        let kind: ItemKind = row.item_kind.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid item kind in order line: {e}"))
        })?;
        let raw_id = match kind {
            ItemKind::Simple => row.product_id,
            ItemKind::Variant => row.variant_id,
        }
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "order line {} has no id for kind {kind}",
                row.id
            ))
        })?;

        Ok(Self {
            id: OrderLineId::new(row.id),
            order_id: OrderId::new(row.order_id),
            item: ItemRef::from_parts(kind, raw_id),
            display_name: row.display_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order reads and fulfillment transitions.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Most recent orders, newest first, optionally filtered by
    /// fulfillment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored order is invalid.
    pub async fn list_recent(
        &self,
        status: Option<FulfillmentStatus>,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, token, owner_id, customer_email,
                   subtotal, discount, shipping, tax, total,
                   coupon_code, payment_method, payment_status, fulfillment_status,
                   gateway_order_id, gateway_payment_id, created_at, updated_at
            FROM orders
            WHERE ($1::text IS NULL OR fulfillment_status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            ",
        )
        .bind(status.map(|s| s.to_string()))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// One order by token, any owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored order is invalid.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, token, owner_id, customer_email,
                   subtotal, discount, shipping, tax, total,
                   coupon_code, payment_method, payment_status, fulfillment_status,
                   gateway_order_id, gateway_payment_id, created_at, updated_at
            FROM orders
            WHERE token = $1
            ",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// The line snapshots of one order, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored line is invalid.
    pub async fn list_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT id, order_id, item_kind, product_id, variant_id,
                   display_name, unit_price, quantity, line_total
            FROM order_lines
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Move an order to a new fulfillment status.
    ///
    /// The update only matches if the order still carries the status it
    /// had when validated, so a concurrent transition surfaces as
    /// [`TransitionError::Conflict`] rather than a lost update.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotFound`] if no order has that token,
    /// [`TransitionError::Invalid`] if the state machine forbids the move,
    /// and [`TransitionError::Conflict`] if the order changed underneath.
    pub async fn transition(
        &self,
        token: &str,
        next: FulfillmentStatus,
    ) -> Result<Order, TransitionError> {
        let Some(order) = self.find_by_token(token).await? else {
            return Err(TransitionError::NotFound);
        };

        let from = order.fulfillment_status;
        if !from.can_transition_to(next) {
            return Err(TransitionError::Invalid { from, next });
        }

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE orders
            SET fulfillment_status = $1, updated_at = now()
            WHERE token = $2 AND fulfillment_status = $3
            RETURNING id, token, owner_id, customer_email,
                      subtotal, discount, shipping, tax, total,
                      coupon_code, payment_method, payment_status, fulfillment_status,
                      gateway_order_id, gateway_payment_id, created_at, updated_at
            ",
        )
        .bind(next.to_string())
        .bind(token)
        .bind(from.to_string())
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(row) => Ok(Order::try_from(row)?),
            None => Err(TransitionError::Conflict),
        }
    }
}
