//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Cart
//! GET    /api/cart             - Current cart with display data
//! POST   /api/cart/lines       - Add/merge a line {item_kind, item_id, quantity}
//! PATCH  /api/cart/lines/{id}  - Set line quantity {quantity}
//! DELETE /api/cart/lines/{id}  - Remove a line
//!
//! # Checkout
//! POST /api/checkout/quote     - Price the cart {coupon_code?}
//! POST /api/checkout/intent    - Create a gateway payment intent {coupon_code?, email?}
//! POST /api/checkout/confirm   - Commit a verified gateway payment
//! POST /api/checkout/direct    - Place a pay-on-delivery order {coupon_code?, email?}
//!
//! # Orders
//! GET  /api/orders             - Orders for the calling customer
//! GET  /api/orders/{token}     - Order detail (owner-scoped)
//! ```
//!
//! Every route requires the `x-customer-ref` header; see
//! [`crate::middleware::CustomerRef`].

pub mod cart;
pub mod checkout;
pub mod orders;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/lines", post(cart::add_line))
        .route(
            "/lines/{id}",
            patch(cart::update_line).delete(cart::remove_line),
        )
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/quote", post(checkout::quote))
        .route("/intent", post(checkout::intent))
        .route("/confirm", post(checkout::confirm))
        .route("/direct", post(checkout::direct))
}

/// Create the order history routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{token}", get(orders::show))
}

/// Create all routes for the storefront API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/cart", cart_routes())
        .nest("/api/checkout", checkout_routes())
        .nest("/api/orders", order_routes())
}
