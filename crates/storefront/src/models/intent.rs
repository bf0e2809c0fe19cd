//! Payment intent domain types.

use chrono::{DateTime, Utc};

use marram_goods_core::{Email, IntentStatus, OwnerId, PaymentIntentId};

use super::quote::Quote;

/// A single-use payment intent registered with the gateway.
///
/// Holds the quote snapshot from intent-creation time; the callback
/// commits from this snapshot, never from the live cart, so a cart edited
/// mid-payment cannot change what was charged.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: PaymentIntentId,
    /// Gateway-issued order reference, unique per intent.
    pub gateway_order_id: String,
    pub owner_id: OwnerId,
    /// Confirmation email destination, captured when checkout started.
    pub customer_email: Option<Email>,
    pub amount_minor: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub quote: Quote,
    pub created_at: DateTime<Utc>,
}
