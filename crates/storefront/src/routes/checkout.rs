//! Checkout API routes.
//!
//! All money math happens server-side: clients post at most a coupon
//! code and get back a priced quote, never the other way around. The
//! gateway flow is two requests (intent, then confirm); the direct flow
//! commits in one.

use axum::{Json, extract::State, http::StatusCode};
use marram_goods_core::Email;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::orders::OrderSummaryView;
use crate::error::{AppError, Result};
use crate::middleware::CustomerRef;
use crate::models::quote::Quote;
use crate::state::AppState;

/// Request to price the current cart.
#[derive(Debug, Deserialize, Default)]
pub struct QuoteRequest {
    pub coupon_code: Option<String>,
}

/// Request to start a gateway checkout.
#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub coupon_code: Option<String>,
    /// Destination for the order confirmation email.
    pub email: Option<String>,
}

/// Response carrying what the client needs to open the gateway widget.
#[derive(Debug, Serialize)]
pub struct IntentView {
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    /// Public API key id for the gateway's client-side SDK.
    pub key_id: String,
}

/// The gateway callback the customer's browser relays after paying.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

/// Request to place a pay-on-delivery order.
#[derive(Debug, Deserialize, Default)]
pub struct DirectRequest {
    pub coupon_code: Option<String>,
    /// Destination for the order confirmation email.
    pub email: Option<String>,
}

fn parse_email(raw: Option<String>) -> Result<Option<Email>> {
    raw.map(|s| {
        s.parse::<Email>()
            .map_err(|_| AppError::BadRequest(format!("invalid email address: {s}")))
    })
    .transpose()
}

/// Price the current cart, optionally applying a coupon.
///
/// POST /api/checkout/quote
///
/// # Errors
///
/// Returns `AppError` for an empty cart, an invalid coupon, or a line
/// exceeding live stock.
#[instrument(skip(state), fields(owner = %owner))]
pub async fn quote(
    CustomerRef(owner): CustomerRef,
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<Quote>> {
    let quote = state
        .checkout()
        .quote(owner, req.coupon_code.as_deref())
        .await?;
    Ok(Json(quote))
}

/// Create a payment intent for the current cart.
///
/// POST /api/checkout/intent
///
/// # Errors
///
/// Quote errors as for [`quote`], plus gateway failures.
#[instrument(skip(state, req), fields(owner = %owner))]
pub async fn intent(
    CustomerRef(owner): CustomerRef,
    State(state): State<AppState>,
    Json(req): Json<IntentRequest>,
) -> Result<(StatusCode, Json<IntentView>)> {
    let email = parse_email(req.email)?;
    let intent = state
        .checkout()
        .create_intent(owner, req.coupon_code.as_deref(), email)
        .await?;

    let view = IntentView {
        gateway_order_id: intent.gateway_order_id,
        amount_minor: intent.amount_minor,
        currency: intent.currency,
        key_id: state.config().gateway.key_id.clone(),
    };
    Ok((StatusCode::CREATED, Json(view)))
}

/// Submit the signed payment callback and commit the order.
///
/// POST /api/checkout/confirm
///
/// Replies `201` when this call created the order and `200` when the
/// callback was a replay of an already-committed payment.
///
/// # Errors
///
/// `400` for a forged signature, `504` for a gateway timeout, `409` for
/// a concurrent duplicate, `500` if payment was captured but the order
/// could not be committed.
#[instrument(skip(state, req), fields(owner = %owner))]
pub async fn confirm(
    CustomerRef(owner): CustomerRef,
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<(StatusCode, Json<OrderSummaryView>)> {
    let (order, created) = state
        .checkout()
        .confirm(
            owner,
            &req.gateway_order_id,
            &req.gateway_payment_id,
            &req.signature,
        )
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(OrderSummaryView::from(order))))
}

/// Place a pay-on-delivery order from the current cart.
///
/// POST /api/checkout/direct
///
/// # Errors
///
/// Quote errors as for [`quote`], plus stock and coupon consumption
/// failures.
#[instrument(skip(state, req), fields(owner = %owner))]
pub async fn direct(
    CustomerRef(owner): CustomerRef,
    State(state): State<AppState>,
    Json(req): Json<DirectRequest>,
) -> Result<(StatusCode, Json<OrderSummaryView>)> {
    let email = parse_email(req.email)?;
    let order = state
        .checkout()
        .direct(owner, req.coupon_code.as_deref(), email)
        .await?;

    Ok((StatusCode::CREATED, Json(OrderSummaryView::from(order))))
}
