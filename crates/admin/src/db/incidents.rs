//! Payment incident queue: list and resolve.
//!
//! Incidents are written by the storefront whenever captured money and
//! local state diverge. Resolving one is a compare-and-swap on
//! `status = 'open'`; a second resolve attempt reports the incident as
//! already handled instead of clobbering the first operator's note.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use marram_goods_core::{IncidentId, IncidentStatus, OwnerId};

use super::RepositoryError;
use crate::models::incident::Incident;

/// Why resolving an incident was refused.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No incident with that id.
    #[error("incident not found")]
    NotFound,

    /// The incident was already resolved.
    #[error("incident already resolved")]
    AlreadyResolved,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct IncidentRow {
    id: i32,
    gateway_order_id: String,
    gateway_payment_id: Option<String>,
    owner_id: Uuid,
    amount_minor: i64,
    reason: String,
    detail: String,
    status: String,
    resolution_note: Option<String>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = RepositoryError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        let status: IncidentStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid incident status in database: {e}"))
        })?;

        Ok(Self {
            id: IncidentId::new(row.id),
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            owner_id: OwnerId::from(row.owner_id),
            amount_minor: row.amount_minor,
            reason: row.reason,
            detail: row.detail,
            status,
            resolution_note: row.resolution_note,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the payment incident queue.
pub struct IncidentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> IncidentRepository<'a> {
    /// Create a new incident repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Incidents, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn list(
        &self,
        status: Option<IncidentStatus>,
        limit: i64,
    ) -> Result<Vec<Incident>, RepositoryError> {
        let rows = sqlx::query_as::<_, IncidentRow>(
            r"
            SELECT id, gateway_order_id, gateway_payment_id, owner_id,
                   amount_minor, reason, detail, status, resolution_note,
                   created_at, resolved_at
            FROM payment_incidents
            WHERE ($1::text IS NULL OR status = $1)
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

    /// Mark an open incident as resolved, recording an optional operator
    /// note.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] if no incident has that id and
    /// [`ResolveError::AlreadyResolved`] if it was resolved before this
    /// call.
    pub async fn resolve(
        &self,
        id: IncidentId,
        note: Option<&str>,
    ) -> Result<Incident, ResolveError> {
        let row = sqlx::query_as::<_, IncidentRow>(
            r"
            UPDATE payment_incidents
            SET status = 'resolved', resolved_at = now(), resolution_note = $2
            WHERE id = $1 AND status = 'open'
            RETURNING id, gateway_order_id, gateway_payment_id, owner_id,
                      amount_minor, reason, detail, status, resolution_note,
                      created_at, resolved_at
            ",
        )
        .bind(id.as_i32())
        .bind(note)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if let Some(row) = row {
            return Ok(Incident::try_from(row)?);
        }

        // The update matched nothing: either the id is unknown or the
        // incident is no longer open.
        let exists = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM payment_incidents WHERE id = $1",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match exists {
            Some(_) => Err(ResolveError::AlreadyResolved),
            None => Err(ResolveError::NotFound),
        }
    }
}
