//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use marram_goods_core::{
    Email, FulfillmentStatus, ItemRef, OrderId, OrderLineId, OwnerId, PaymentMethod, PaymentStatus,
};

/// A committed order.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable unique token, e.g. `MG-7F3KQ2XN`.
    pub token: String,
    pub owner_id: OwnerId,
    pub customer_email: Option<Email>,
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

/// One line of a committed order.
///
/// Display name and prices are denormalized; the line stays renderable
/// even if the catalog row is later edited or deleted.
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

/// Insert payload for a new order. The token is generated separately and
/// passed alongside, so collision retries do not rebuild the payload.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner_id: OwnerId,
    pub customer_email: Option<Email>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
}

/// Insert payload for one order line.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub item: ItemRef,
    pub display_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}
