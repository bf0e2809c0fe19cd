//! Priced cart snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use marram_goods_core::{CurrencyCode, ItemRef};

/// One cart line resolved against the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub item: ItemRef,
    pub display_name: String,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A fully priced cart: lines, discount, shipping, tax, and totals.
///
/// Serialized into the payment intent as a snapshot, so the amounts the
/// customer approved are exactly the amounts the order commits with.
/// `amount_minor` is the gateway wire amount (`total` in cents).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub coupon_code: Option<String>,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub amount_minor: i64,
}

impl Quote {
    /// Total quantity across all lines.
    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}
