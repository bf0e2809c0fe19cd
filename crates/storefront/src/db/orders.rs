//! Order storage.
//!
//! Orders and their lines are inserted in one transaction. Two unique
//! constraints matter here: the token (collisions are retried by the
//! caller with a fresh token) and the (gateway order, gateway payment)
//! pair, which is the database-level idempotency backstop for the
//! payment callback. Both are surfaced as distinct variants of
//! [`OrderInsertError`] so the checkout service can react to each.

use chrono::{DateTime, Utc};
use marram_goods_core::{
    Email, FulfillmentStatus, ItemKind, ItemRef, OrderId, OrderLineId, OwnerId, PaymentMethod,
    PaymentStatus,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{PgStore, RepositoryError};
use crate::models::order::{NewOrder, NewOrderLine, Order, OrderLine};

/// Why an order insert did not go through.
#[derive(Debug, thiserror::Error)]
pub enum OrderInsertError {
    /// The generated token is already taken. Retry with a new token.
    #[error("order token collision")]
    TokenCollision,

    /// An order for this (gateway order, gateway payment) pair already
    /// exists. The caller should return that order instead.
    #[error("an order for this gateway payment already exists")]
    DuplicateGatewayPair,

    #[error(transparent)]
    Other(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderInsertError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.constraint() == Some("orders_token_key") {
                return Self::TokenCollision;
            }
            if db_err.constraint() == Some("orders_gateway_pair_idx") {
                return Self::DuplicateGatewayPair;
            }
        }
        Self::Other(RepositoryError::Database(e))
    }
}

/// Order storage: transactional insert plus owner-scoped reads.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Send + Sync {
    /// Insert an order and all of its lines in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`OrderInsertError::TokenCollision`] if `token` is taken,
    /// [`OrderInsertError::DuplicateGatewayPair`] if an order for the
    /// same gateway payment already exists, and
    /// [`OrderInsertError::Other`] for anything else.
    async fn insert_order(
        &self,
        token: &str,
        order: &NewOrder,
        lines: &[NewOrderLine],
    ) -> Result<Order, OrderInsertError>;

    /// Look up the order materialized from a given gateway payment, if
    /// one exists. This is the replay check for the payment callback.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored order is invalid.
    async fn find_by_gateway_pair(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// All orders belonging to an owner, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored order is invalid.
    async fn list_orders_for_owner(&self, owner: OwnerId) -> Result<Vec<Order>, RepositoryError>;

    /// One order by token, scoped to its owner. `None` when the token
    /// does not exist or belongs to someone else; callers cannot tell
    /// the two apart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored order is invalid.
    async fn find_order_by_token_for_owner(
        &self,
        owner: OwnerId,
        token: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// The line snapshots of one order, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored line is invalid.
    async fn list_order_lines(&self, order_id: OrderId)
    -> Result<Vec<OrderLine>, RepositoryError>;
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
        let customer_email = row
            .customer_email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;
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
            customer_email,
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
// PgStore implementation
// =============================================================================

impl OrderStore for PgStore {
    async fn insert_order(
        &self,
        token: &str,
        order: &NewOrder,
        lines: &[NewOrderLine],
    ) -> Result<Order, OrderInsertError> {
        let mut tx = self.pool().begin().await.map_err(RepositoryError::from)?;

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO orders (
                token, owner_id, customer_email,
                subtotal, discount, shipping, tax, total,
                coupon_code, payment_method, payment_status,
                gateway_order_id, gateway_payment_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, token, owner_id, customer_email,
                      subtotal, discount, shipping, tax, total,
                      coupon_code, payment_method, payment_status, fulfillment_status,
                      gateway_order_id, gateway_payment_id, created_at, updated_at
            ",
        )
        .bind(token)
        .bind(order.owner_id.as_uuid())
        .bind(order.customer_email.as_ref().map(Email::as_str))
        .bind(order.subtotal)
        .bind(order.discount)
        .bind(order.shipping)
        .bind(order.tax)
        .bind(order.total)
        .bind(order.coupon_code.as_deref())
        .bind(order.payment_method.to_string())
        .bind(order.payment_status.to_string())
        .bind(order.gateway_order_id.as_deref())
        .bind(order.gateway_payment_id.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        for line in lines {
            let (product_id, variant_id) = match line.item {
                ItemRef::Simple(id) => (Some(id.as_i32()), None),
                ItemRef::Variant(id) => (None, Some(id.as_i32())),
            };

            sqlx::query(
                r"
                INSERT INTO order_lines (
                    order_id, item_kind, product_id, variant_id,
                    display_name, unit_price, quantity, line_total
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(row.id)
            .bind(line.item.kind().to_string())
            .bind(product_id)
            .bind(variant_id)
            .bind(&line.display_name)
            .bind(line.unit_price)
            .bind(line.quantity)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(row.try_into()?)
    }

    async fn find_by_gateway_pair(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, token, owner_id, customer_email,
                   subtotal, discount, shipping, tax, total,
                   coupon_code, payment_method, payment_status, fulfillment_status,
                   gateway_order_id, gateway_payment_id, created_at, updated_at
            FROM orders
            WHERE gateway_order_id = $1 AND gateway_payment_id = $2
            ",
        )
        .bind(gateway_order_id)
        .bind(gateway_payment_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_orders_for_owner(&self, owner: OwnerId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, token, owner_id, customer_email,
                   subtotal, discount, shipping, tax, total,
                   coupon_code, payment_method, payment_status, fulfillment_status,
                   gateway_order_id, gateway_payment_id, created_at, updated_at
            FROM orders
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(owner.as_uuid())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_order_by_token_for_owner(
        &self,
        owner: OwnerId,
        token: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, token, owner_id, customer_email,
                   subtotal, discount, shipping, tax, total,
                   coupon_code, payment_method, payment_status, fulfillment_status,
                   gateway_order_id, gateway_payment_id, created_at, updated_at
            FROM orders
            WHERE token = $1 AND owner_id = $2
            ",
        )
        .bind(token)
        .bind(owner.as_uuid())
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_order_lines(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderLine>, RepositoryError> {
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
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
