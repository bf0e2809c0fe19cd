//! Order domain types as the admin console sees them.
//!
//! These mirror the storefront's order records but are not owner-scoped,
//! and the customer email is kept as raw text: an operator should still
//! see an order whose email no longer parses.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use marram_goods_core::{
    FulfillmentStatus, ItemRef, OrderId, OrderLineId, OwnerId, PaymentMethod, PaymentStatus,
};

/// A committed order.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable unique token, e.g. `MG-7F3KQ2XN`.
    pub token: String,
    pub owner_id: OwnerId,
    pub customer_email: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of a committed order, as snapshotted at commit time.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub item: ItemRef,
    pub display_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}
