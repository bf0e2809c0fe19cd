//! Payment reconciliation incident types.
//!
//! An incident is a captured payment the storefront could not turn into
//! a committed order. The reason column is kept as raw text here; the
//! admin console displays it, it never branches on it.

use chrono::{DateTime, Utc};

use marram_goods_core::{IncidentId, IncidentStatus, OwnerId};

/// A captured payment with no committed order, awaiting manual review.
#[derive(Debug, Clone)]
pub struct Incident {
    pub id: IncidentId,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub owner_id: OwnerId,
    /// Captured amount in minor units, as reported by the gateway.
    pub amount_minor: i64,
    pub reason: String,
    pub detail: String,
    pub status: IncidentStatus,
    /// Operator note recorded when the incident was resolved.
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
