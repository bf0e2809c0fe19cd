//! Payment incident storage.
//!
//! The storefront only ever opens incidents; listing and resolving them
//! is the admin console's job.

use chrono::{DateTime, Utc};
use marram_goods_core::{IncidentId, IncidentStatus, OwnerId};
use uuid::Uuid;

use super::{PgStore, RepositoryError};
use crate::models::incident::{IncidentReason, NewIncident, PaymentIncident};

/// Incident storage: append-only from the storefront's point of view.
#[allow(async_fn_in_trait)]
pub trait IncidentStore: Send + Sync {
    /// Record a captured payment that could not be turned into an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    async fn insert_incident(
        &self,
        incident: &NewIncident,
    ) -> Result<PaymentIncident, RepositoryError>;
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PaymentIncidentRow {
    id: i32,
    gateway_order_id: String,
    gateway_payment_id: Option<String>,
    owner_id: Uuid,
    amount_minor: i64,
    reason: String,
    detail: String,
    status: String,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentIncidentRow> for PaymentIncident {
    type Error = RepositoryError;

    fn try_from(row: PaymentIncidentRow) -> Result<Self, Self::Error> {
        let reason: IncidentReason = row.reason.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid incident reason in database: {e}"))
        })?;
        let status: IncidentStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid incident status in database: {e}"))
        })?;

        Ok(Self {
            id: IncidentId::new(row.id),
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            owner_id: OwnerId::from(row.owner_id),
            amount_minor: row.amount_minor,
            reason,
            detail: row.detail,
            status,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

// =============================================================================
// PgStore implementation
// =============================================================================

impl IncidentStore for PgStore {
    async fn insert_incident(
        &self,
        incident: &NewIncident,
    ) -> Result<PaymentIncident, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentIncidentRow>(
            r"
            INSERT INTO payment_incidents (
                gateway_order_id, gateway_payment_id, owner_id,
                amount_minor, reason, detail
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, gateway_order_id, gateway_payment_id, owner_id,
                      amount_minor, reason, detail, status, created_at, resolved_at
            ",
        )
        .bind(&incident.gateway_order_id)
        .bind(incident.gateway_payment_id.as_deref())
        .bind(incident.owner_id.as_uuid())
        .bind(incident.amount_minor)
        .bind(incident.reason.to_string())
        .bind(&incident.detail)
        .fetch_one(self.pool())
        .await?;

        row.try_into()
    }
}
