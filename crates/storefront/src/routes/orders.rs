//! Customer order history routes.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use marram_goods_core::{FulfillmentStatus, ItemRef, PaymentMethod, PaymentStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use crate::db::OrderStore;
use crate::error::{AppError, Result};
use crate::middleware::CustomerRef;
use crate::models::order::{Order, OrderLine};
use crate::state::AppState;

/// An order as listed in the customer's history.
#[derive(Debug, Serialize)]
pub struct OrderSummaryView {
    pub token: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderSummaryView {
    fn from(order: Order) -> Self {
        Self {
            token: order.token,
            subtotal: order.subtotal,
            discount: order.discount,
            shipping: order.shipping,
            tax: order.tax,
            total: order.total,
            coupon_code: order.coupon_code,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            fulfillment_status: order.fulfillment_status,
            created_at: order.created_at,
        }
    }
}

/// One line of an order detail.
#[derive(Debug, Serialize)]
pub struct OrderLineView {
    pub item: ItemRef,
    pub display_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

impl From<OrderLine> for OrderLineView {
    fn from(line: OrderLine) -> Self {
        Self {
            item: line.item,
            display_name: line.display_name,
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total: line.line_total,
        }
    }
}

/// Full order detail, lines included.
#[derive(Debug, Serialize)]
pub struct OrderDetailView {
    #[serde(flatten)]
    pub summary: OrderSummaryView,
    pub lines: Vec<OrderLineView>,
}

/// Orders for the calling customer, newest first.
///
/// GET /api/orders
///
/// # Errors
///
/// Returns `AppError` if the listing fails.
#[instrument(skip(state))]
pub async fn index(
    CustomerRef(owner): CustomerRef,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderSummaryView>>> {
    let orders = state.store().list_orders_for_owner(owner).await?;
    Ok(Json(orders.into_iter().map(OrderSummaryView::from).collect()))
}

/// One order by token, scoped to the calling customer.
///
/// GET /api/orders/{token}
///
/// # Errors
///
/// `404` if no such order exists for this customer.
#[instrument(skip(state), fields(owner = %owner, token = %token))]
pub async fn show(
    CustomerRef(owner): CustomerRef,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<OrderDetailView>> {
    let order = state
        .store()
        .find_order_by_token_for_owner(owner, &token)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {token} not found")))?;

    let lines = state.store().list_order_lines(order.id).await?;

    Ok(Json(OrderDetailView {
        summary: OrderSummaryView::from(order),
        lines: lines.into_iter().map(OrderLineView::from).collect(),
    }))
}
