//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use marram_goods_core::{CartLineId, ItemRef, OwnerId};

/// One line in a customer's cart.
///
/// `unit_price` is the price observed when the line was added or last
/// merged. Quotes always re-resolve the live catalog price; this field is
/// display-only.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub id: CartLineId,
    pub owner_id: OwnerId,
    pub item: ItemRef,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
