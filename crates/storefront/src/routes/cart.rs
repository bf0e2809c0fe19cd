//! Cart API routes.
//!
//! Carts live server-side, keyed by the customer reference. Mutations
//! return the full refreshed cart so clients redraw from one response.
//! Prices shown here are snapshots taken at the last mutation; the
//! checkout quote is the authoritative repricing.

use axum::{
    Json,
    extract::{Path, State},
};
use marram_goods_core::{CartLineId, ItemKind, ItemRef, OwnerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::{CartStore, CatalogStore, PgStore};
use crate::error::{AppError, Result};
use crate::middleware::CustomerRef;
use crate::models::cart::CartLine;
use crate::services::checkout::CheckoutError;
use crate::services::display_cache::DisplayCache;
use crate::state::AppState;

/// A cart line as rendered to the storefront client.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub id: CartLineId,
    pub item: ItemRef,
    pub display_name: String,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    /// Set when the catalog row behind this line has been removed.
    pub unavailable: bool,
}

/// The whole cart, with snapshot totals.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub subtotal: Decimal,
    pub item_count: i32,
}

/// Request to add (or merge into) a cart line.
#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub item_kind: ItemKind,
    pub item_id: i32,
    pub quantity: i32,
}

/// Request to set the quantity of an existing line.
#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    pub quantity: i32,
}

/// Assemble the client-facing cart from stored lines.
///
/// Display names and images come from the display cache; a line whose
/// catalog row has vanished keeps its stored snapshot and is flagged
/// `unavailable` so the client can prompt for removal.
async fn build_cart_view(
    store: &PgStore,
    cache: &DisplayCache,
    lines: Vec<CartLine>,
) -> Result<CartView> {
    let mut views = Vec::with_capacity(lines.len());
    let mut subtotal = Decimal::ZERO;
    let mut item_count = 0;

    for line in lines {
        let display = cache.get(store, line.item).await?;
        let line_total = line.unit_price * Decimal::from(line.quantity);
        subtotal += line_total;
        item_count += line.quantity;

        let (display_name, image_url, unavailable) = match display {
            Some(info) => (info.display_name, info.image_url, false),
            None => ("(no longer available)".to_string(), None, true),
        };

        views.push(CartLineView {
            id: line.id,
            item: line.item,
            display_name,
            image_url,
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total,
            unavailable,
        });
    }

    Ok(CartView {
        lines: views,
        subtotal,
        item_count,
    })
}

async fn current_cart(state: &AppState, owner: OwnerId) -> Result<CartView> {
    let lines = state.store().list_lines(owner).await?;
    build_cart_view(state.store(), state.display_cache(), lines).await
}

/// Current cart contents.
///
/// GET /api/cart
///
/// # Errors
///
/// Returns `AppError` if the cart cannot be loaded.
#[instrument(skip(state))]
pub async fn show(
    CustomerRef(owner): CustomerRef,
    State(state): State<AppState>,
) -> Result<Json<CartView>> {
    Ok(Json(current_cart(&state, owner).await?))
}

/// Add an item to the cart, merging with an existing line for the same
/// item.
///
/// POST /api/cart/lines
///
/// The merged quantity must stay within live stock; the unit price
/// snapshot is refreshed from the catalog on every add.
///
/// # Errors
///
/// `404` if the item does not exist, `409` with the available quantity
/// if the merged quantity would exceed stock, `400` for a non-positive
/// quantity.
#[instrument(skip(state), fields(owner = %owner))]
pub async fn add_line(
    CustomerRef(owner): CustomerRef,
    State(state): State<AppState>,
    Json(req): Json<AddLineRequest>,
) -> Result<Json<CartView>> {
    if req.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }

    let item = ItemRef::from_parts(req.item_kind, req.item_id);
    let resolved = state
        .store()
        .resolve_item(item)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item {item} not found")))?;

    // The merge target is the owner's existing line for this item, if any.
    let existing: i32 = state
        .store()
        .list_lines(owner)
        .await?
        .iter()
        .find(|line| line.item == item)
        .map_or(0, |line| line.quantity);

    if existing + req.quantity > resolved.stock {
        let available = (resolved.stock - existing).max(0);
        return Err(CheckoutError::OutOfStock { item, available }.into());
    }

    state
        .store()
        .upsert_line(owner, item, req.quantity, resolved.unit_price)
        .await?;

    Ok(Json(current_cart(&state, owner).await?))
}

/// Set the quantity of a cart line.
///
/// PATCH /api/cart/lines/{id}
///
/// # Errors
///
/// `404` if the line does not exist for this customer, `409` with the
/// available quantity if the new quantity exceeds stock, `400` for a
/// non-positive quantity.
#[instrument(skip(state), fields(owner = %owner))]
pub async fn update_line(
    CustomerRef(owner): CustomerRef,
    State(state): State<AppState>,
    Path(line_id): Path<CartLineId>,
    Json(req): Json<UpdateLineRequest>,
) -> Result<Json<CartView>> {
    if req.quantity < 1 {
        return Err(AppError::BadRequest(
            "quantity must be at least 1; delete the line instead".to_string(),
        ));
    }

    // Scope the lookup by owner before touching stock.
    let line = state
        .store()
        .list_lines(owner)
        .await?
        .into_iter()
        .find(|line| line.id == line_id)
        .ok_or_else(|| AppError::NotFound(format!("cart line {line_id} not found")))?;

    let resolved = state
        .store()
        .resolve_item(line.item)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item {} not found", line.item)))?;
    if req.quantity > resolved.stock {
        return Err(CheckoutError::OutOfStock {
            item: line.item,
            available: resolved.stock,
        }
        .into());
    }

    state
        .store()
        .set_quantity(owner, line_id, req.quantity)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("cart line {line_id} not found")))?;

    Ok(Json(current_cart(&state, owner).await?))
}

/// Remove a cart line.
///
/// DELETE /api/cart/lines/{id}
///
/// # Errors
///
/// `404` if the line does not exist for this customer.
#[instrument(skip(state), fields(owner = %owner))]
pub async fn remove_line(
    CustomerRef(owner): CustomerRef,
    State(state): State<AppState>,
    Path(line_id): Path<CartLineId>,
) -> Result<Json<CartView>> {
    let removed = state.store().remove_line(owner, line_id).await?;
    if !removed {
        return Err(AppError::NotFound(format!("cart line {line_id} not found")));
    }

    Ok(Json(current_cart(&state, owner).await?))
}
