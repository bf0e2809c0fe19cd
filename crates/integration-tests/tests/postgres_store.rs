//! Postgres-backed storage tests.
//!
//! Ignored by default: they need a migrated database. Point
//! `DATABASE_URL` at one (after `mg-cli migrate`) and run:
//!
//! ```bash
//! cargo test -p marram-goods-integration-tests -- --ignored
//! ```
//!
//! Fixture rows are keyed by fresh UUIDs and never cleaned up; use a
//! disposable database. These suites cover the conditional-update SQL
//! the in-memory store can only imitate.

#![allow(clippy::unwrap_used)]

use marram_goods_core::{CouponId, ItemRef, OwnerId, PaymentMethod, PaymentStatus, ProductId};
use marram_goods_storefront::db::{
    CatalogStore, CouponStore, IntentStore, OrderInsertError, OrderStore, PgStore,
    RepositoryError,
};
use marram_goods_storefront::models::order::NewOrder;
use marram_goods_storefront::models::quote::Quote;
use rust_decimal::Decimal;
use uuid::Uuid;

async fn pg() -> PgStore {
    let url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a migrated database");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect to test database");
    PgStore::new(pool)
}

async fn seed_product(store: &PgStore, stock: i32) -> ItemRef {
    let id: i32 = sqlx::query_scalar(
        "INSERT INTO products (name, price, stock) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(format!("pg test product {}", Uuid::new_v4()))
    .bind(Decimal::new(10000, 2))
    .bind(stock)
    .fetch_one(store.pool())
    .await
    .expect("insert product");
    ItemRef::Simple(ProductId::new(id))
}

async fn seed_coupon(store: &PgStore, usage_limit: Option<i32>) -> CouponId {
    let code = format!("PG{}", Uuid::new_v4().simple()).to_uppercase();
    let id: i32 = sqlx::query_scalar(
        "INSERT INTO coupons (code, discount_percent, valid_from, valid_to, usage_limit) \
         VALUES ($1, 10, now() - interval '1 day', now() + interval '1 day', $2) RETURNING id",
    )
    .bind(code)
    .bind(usage_limit)
    .fetch_one(store.pool())
    .await
    .expect("insert coupon");
    CouponId::new(id)
}

fn fresh_token() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    let (short, _) = hex.split_at(8);
    format!("MG-{short}")
}

fn paid_order(gateway_order_id: &str, gateway_payment_id: &str) -> NewOrder {
    NewOrder {
        owner_id: OwnerId::from(Uuid::new_v4()),
        customer_email: None,
        subtotal: Decimal::new(20000, 2),
        discount: Decimal::ZERO,
        shipping: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: Decimal::new(20000, 2),
        coupon_code: None,
        payment_method: PaymentMethod::Gateway,
        payment_status: PaymentStatus::Paid,
        gateway_order_id: Some(gateway_order_id.to_string()),
        gateway_payment_id: Some(gateway_payment_id.to_string()),
    }
}

// =============================================================================
// Stock
// =============================================================================

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a migrated Postgres"]
async fn test_stock_decrement_is_conditional() {
    let store = pg().await;
    let item = seed_product(&store, 1).await;

    assert!(store.try_decrement_stock(item, 1).await.unwrap());
    assert!(!store.try_decrement_stock(item, 1).await.unwrap());
    assert_eq!(store.available_stock(item).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a migrated Postgres"]
async fn test_concurrent_single_unit_sells_once() {
    let store = pg().await;
    let item = seed_product(&store, 1).await;

    let first = {
        let store = store.clone();
        tokio::spawn(async move { store.try_decrement_stock(item, 1).await.unwrap() })
    };
    let second = {
        let store = store.clone();
        tokio::spawn(async move { store.try_decrement_stock(item, 1).await.unwrap() })
    };
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    assert!(first ^ second, "exactly one decrement must win");
    assert_eq!(store.available_stock(item).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a migrated Postgres"]
async fn test_increment_restores_stock() {
    let store = pg().await;
    let item = seed_product(&store, 3).await;

    assert!(store.try_decrement_stock(item, 3).await.unwrap());
    store.increment_stock(item, 3).await.unwrap();
    assert_eq!(store.available_stock(item).await.unwrap(), 3);
}

// =============================================================================
// Coupons
// =============================================================================

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a migrated Postgres"]
async fn test_coupon_usage_stops_at_limit() {
    let store = pg().await;
    let coupon = seed_coupon(&store, Some(1)).await;

    assert!(store.try_increment_usage(coupon).await.unwrap());
    assert!(!store.try_increment_usage(coupon).await.unwrap());

    store.release_usage(coupon).await.unwrap();
    assert!(store.try_increment_usage(coupon).await.unwrap());
}

// =============================================================================
// Intents
// =============================================================================

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a migrated Postgres"]
async fn test_intent_consumed_exactly_once() {
    let store = pg().await;
    let gateway_order_id = format!("order_{}", Uuid::new_v4().simple());

    store
        .insert_intent(
            &gateway_order_id,
            OwnerId::from(Uuid::new_v4()),
            None,
            18000,
            "USD",
            &Quote::default(),
        )
        .await
        .unwrap();

    let duplicate = store
        .insert_intent(
            &gateway_order_id,
            OwnerId::from(Uuid::new_v4()),
            None,
            18000,
            "USD",
            &Quote::default(),
        )
        .await;
    assert!(matches!(duplicate, Err(RepositoryError::Conflict(_))));

    assert!(store.try_consume_intent(&gateway_order_id).await.unwrap());
    assert!(!store.try_consume_intent(&gateway_order_id).await.unwrap());
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a migrated Postgres"]
async fn test_gateway_pair_unique_across_orders() {
    let store = pg().await;
    let gateway_order_id = format!("order_{}", Uuid::new_v4().simple());
    let gateway_payment_id = format!("pay_{}", Uuid::new_v4().simple());
    let new_order = paid_order(&gateway_order_id, &gateway_payment_id);

    let token = fresh_token();
    store.insert_order(&token, &new_order, &[]).await.unwrap();

    let clash = store.insert_order(&fresh_token(), &new_order, &[]).await;
    assert!(matches!(clash, Err(OrderInsertError::DuplicateGatewayPair)));

    let found = store
        .find_by_gateway_pair(&gateway_order_id, &gateway_payment_id)
        .await
        .unwrap()
        .expect("winner's order must be findable");
    assert_eq!(found.token, token);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a migrated Postgres"]
async fn test_token_collision_is_distinct() {
    let store = pg().await;
    let token = fresh_token();

    let first = paid_order(
        &format!("order_{}", Uuid::new_v4().simple()),
        &format!("pay_{}", Uuid::new_v4().simple()),
    );
    store.insert_order(&token, &first, &[]).await.unwrap();

    let second = paid_order(
        &format!("order_{}", Uuid::new_v4().simple()),
        &format!("pay_{}", Uuid::new_v4().simple()),
    );
    let clash = store.insert_order(&token, &second, &[]).await;
    assert!(matches!(clash, Err(OrderInsertError::TokenCollision)));
}
