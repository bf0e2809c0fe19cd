//! Payment reconciliation incident types.

use chrono::{DateTime, Utc};

use marram_goods_core::{IncidentId, IncidentStatus, OwnerId};

/// Why captured money ended up without a committed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentReason {
    /// Stock ran out between payment approval and commit.
    StockCommitFailed,
    /// The coupon's usage ceiling was reached by a concurrent order.
    CouponExhausted,
    /// The order insert itself failed after stock and coupon committed.
    OrderPersistFailed,
}

impl std::fmt::Display for IncidentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StockCommitFailed => write!(f, "stock_commit_failed"),
            Self::CouponExhausted => write!(f, "coupon_exhausted"),
            Self::OrderPersistFailed => write!(f, "order_persist_failed"),
        }
    }
}

impl std::str::FromStr for IncidentReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock_commit_failed" => Ok(Self::StockCommitFailed),
            "coupon_exhausted" => Ok(Self::CouponExhausted),
            "order_persist_failed" => Ok(Self::OrderPersistFailed),
            _ => Err(format!("invalid incident reason: {s}")),
        }
    }
}

/// A captured payment with no committed order, awaiting manual review.
#[derive(Debug, Clone)]
pub struct PaymentIncident {
    pub id: IncidentId,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub owner_id: OwnerId,
    pub amount_minor: i64,
    pub reason: IncidentReason,
    pub detail: String,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new incident.
#[derive(Debug, Clone)]
pub struct NewIncident {
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub owner_id: OwnerId,
    pub amount_minor: i64,
    pub reason: IncidentReason,
    pub detail: String,
}
