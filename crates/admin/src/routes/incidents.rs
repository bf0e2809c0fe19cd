//! Payment incident handlers: queue listing and resolution.
//!
//! Incidents are written by the storefront when a gateway confirmation
//! cannot be applied (signature mismatch, unknown gateway order, amount
//! drift). Operators work the queue here and close each entry with an
//! optional note once the money question is settled.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use marram_goods_core::{IncidentId, IncidentStatus, OwnerId};

use crate::db::IncidentRepository;
use crate::error::Result;
use crate::middleware::RequireApiToken;
use crate::models::incident::Incident;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// Query parameters for the incident list.
#[derive(Debug, Deserialize)]
pub struct IncidentsQuery {
    /// Only incidents in this status; absent means all.
    pub status: Option<IncidentStatus>,
    /// Page size, capped at [`MAX_LIST_LIMIT`].
    pub limit: Option<i64>,
}

/// One incident as returned by the API.
#[derive(Debug, Serialize)]
pub struct IncidentView {
    pub id: IncidentId,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub owner_id: OwnerId,
    pub amount_minor: i64,
    pub reason: String,
    pub detail: String,
    pub status: IncidentStatus,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<Incident> for IncidentView {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.id,
            gateway_order_id: incident.gateway_order_id,
            gateway_payment_id: incident.gateway_payment_id,
            owner_id: incident.owner_id,
            amount_minor: incident.amount_minor,
            reason: incident.reason,
            detail: incident.detail,
            status: incident.status,
            resolution_note: incident.resolution_note,
            created_at: incident.created_at,
            resolved_at: incident.resolved_at,
        }
    }
}

/// Request body for resolving an incident. The body itself is optional;
/// an empty `POST` resolves without a note.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub note: Option<String>,
}

/// `GET /api/incidents` - the incident queue, newest first.
#[instrument(skip(_auth, state))]
pub async fn index(
    _auth: RequireApiToken,
    State(state): State<AppState>,
    Query(query): Query<IncidentsQuery>,
) -> Result<Json<Vec<IncidentView>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let incidents = IncidentRepository::new(state.pool())
        .list(query.status, limit)
        .await?;

    Ok(Json(incidents.into_iter().map(Into::into).collect()))
}

/// `POST /api/incidents/{id}/resolve` - close an open incident.
#[instrument(skip(_auth, state, body))]
pub async fn resolve(
    _auth: RequireApiToken,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    body: Option<Json<ResolveRequest>>,
) -> Result<Json<IncidentView>> {
    let note = body.and_then(|Json(b)| b.note);
    let incident = IncidentRepository::new(state.pool())
        .resolve(IncidentId::new(id), note.as_deref())
        .await?;

    info!(incident_id = incident.id.as_i32(), "Payment incident resolved");

    Ok(Json(incident.into()))
}
