//! Route table for the admin API.
//!
//! | Method | Path                             | Handler                 |
//! |--------|----------------------------------|-------------------------|
//! | GET    | `/api/orders?status=&limit=`     | [`orders::index`]       |
//! | GET    | `/api/orders/{token}`            | [`orders::show`]        |
//! | POST   | `/api/orders/{token}/fulfillment`| [`orders::transition`]  |
//! | GET    | `/api/incidents?status=&limit=`  | [`incidents::index`]    |
//! | POST   | `/api/incidents/{id}/resolve`    | [`incidents::resolve`]  |
//!
//! All routes require `Authorization: Bearer <ADMIN_API_TOKEN>`; the
//! [`crate::middleware::RequireApiToken`] extractor on each handler
//! enforces it. Health probes live in the binary, outside this table.

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub mod incidents;
pub mod orders;

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{token}", get(orders::show))
        .route("/{token}/fulfillment", post(orders::transition))
}

fn incident_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(incidents::index))
        .route("/{id}/resolve", post(incidents::resolve))
}

/// Build the full admin router.
#[must_use]
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/orders", order_routes())
        .nest("/api/incidents", incident_routes())
}
