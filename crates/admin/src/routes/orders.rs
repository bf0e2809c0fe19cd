//! Order handlers: listing, detail, and fulfillment transitions.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use marram_goods_core::{FulfillmentStatus, ItemRef, OwnerId, PaymentMethod, PaymentStatus};

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireApiToken;
use crate::models::order::{Order, OrderLine};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// Query parameters for the order list.
#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    /// Only orders currently in this fulfillment status.
    pub status: Option<FulfillmentStatus>,
    /// Page size, capped at [`MAX_LIST_LIMIT`].
    pub limit: Option<i64>,
}

/// One order as shown in the list.
#[derive(Debug, Serialize)]
pub struct OrderSummaryView {
    pub token: String,
    pub owner_id: OwnerId,
    pub customer_email: Option<String>,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderSummaryView {
    fn from(order: Order) -> Self {
        Self {
            token: order.token,
            owner_id: order.owner_id,
            customer_email: order.customer_email,
            total: order.total,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            fulfillment_status: order.fulfillment_status,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// One order line in the detail view.
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

/// Full order detail: summary plus money breakdown, gateway references,
/// and line snapshots.
#[derive(Debug, Serialize)]
pub struct OrderDetailView {
    #[serde(flatten)]
    pub summary: OrderSummaryView,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub coupon_code: Option<String>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub lines: Vec<OrderLineView>,
}

impl OrderDetailView {
    fn build(order: Order, lines: Vec<OrderLine>) -> Self {
        Self {
            subtotal: order.subtotal,
            discount: order.discount,
            shipping: order.shipping,
            tax: order.tax,
            coupon_code: order.coupon_code.clone(),
            gateway_order_id: order.gateway_order_id.clone(),
            gateway_payment_id: order.gateway_payment_id.clone(),
            lines: lines.into_iter().map(Into::into).collect(),
            summary: order.into(),
        }
    }
}

/// Request body for a fulfillment transition.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: FulfillmentStatus,
}

/// `GET /api/orders` - recent orders, newest first.
#[instrument(skip(_auth, state))]
pub async fn index(
    _auth: RequireApiToken,
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<OrderSummaryView>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let orders = OrderRepository::new(state.pool())
        .list_recent(query.status, limit)
        .await?;

    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// `GET /api/orders/{token}` - one order with its line snapshots.
#[instrument(skip(_auth, state))]
pub async fn show(
    _auth: RequireApiToken,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<OrderDetailView>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .find_by_token(&token)
        .await?
        .ok_or_else(|| crate::error::AppError::NotFound(format!("order {token}")))?;
    let lines = repo.list_lines(order.id).await?;

    Ok(Json(OrderDetailView::build(order, lines)))
}

/// `POST /api/orders/{token}/fulfillment` - move the order along the
/// fulfillment state machine.
#[instrument(skip(_auth, state, body))]
pub async fn transition(
    _auth: RequireApiToken,
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<OrderSummaryView>> {
    let order = OrderRepository::new(state.pool())
        .transition(&token, body.status)
        .await?;

    info!(
        token = %order.token,
        status = %order.fulfillment_status,
        "Fulfillment status updated"
    );

    Ok(Json(order.into()))
}
