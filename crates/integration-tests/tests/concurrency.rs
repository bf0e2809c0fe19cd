//! Races on the last unit of stock, the last coupon use, and a single
//! payment confirmed twice at once. Whatever the interleaving, stock
//! never goes negative, a coupon never exceeds its ceiling, and one
//! payment produces exactly one order.

#![allow(clippy::unwrap_used)]

use marram_goods_core::{CouponError, ItemRef};
use marram_goods_integration_tests::{
    ScriptedGateway, add_line, checkout_service, owner, percent_coupon, seed_two_line_cart, sign,
};
use marram_goods_storefront::db::MemoryStore;
use marram_goods_storefront::services::checkout::CheckoutError;
use rust_decimal::Decimal;

#[tokio::test]
async fn test_two_buyers_race_for_the_last_unit() {
    let store = MemoryStore::new();
    let last = store.seed_product("Last One", Decimal::new(10000, 2), 1);
    let item = ItemRef::Simple(last);

    let first = owner();
    let second = owner();
    add_line(&store, first, item, 1).await.unwrap();
    add_line(&store, second, item, 1).await.unwrap();

    let service = checkout_service(store.clone(), ScriptedGateway::new());
    let (a, b) = tokio::join!(
        service.direct(first, None, None),
        service.direct(second, None, None),
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one buyer gets the unit");

    let failure = if a.is_err() { a } else { b };
    match failure {
        Err(CheckoutError::OutOfStock { available, .. }) => assert_eq!(available, 0),
        other => panic!("expected OutOfStock, got {other:?}"),
    }

    assert_eq!(store.stock_of(item), Some(0));
    assert_eq!(store.orders().len(), 1);
}

#[tokio::test]
async fn test_last_coupon_use_has_a_single_winner() {
    let store = MemoryStore::new();
    let mut coupon = percent_coupon("LASTUSE", 20, Decimal::ZERO);
    coupon.usage_limit = Some(1);
    store.seed_coupon(coupon);

    let first = owner();
    let second = owner();
    let tee = store.seed_product("Dune Tee", Decimal::new(10000, 2), 10);
    add_line(&store, first, ItemRef::Simple(tee), 1).await.unwrap();
    add_line(&store, second, ItemRef::Simple(tee), 1).await.unwrap();

    let service = checkout_service(store.clone(), ScriptedGateway::new());
    let (a, b) = tokio::join!(
        service.direct(first, Some("LASTUSE"), None),
        service.direct(second, Some("LASTUSE"), None),
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one order takes the last use");
    assert_eq!(store.coupon_usage("LASTUSE"), Some(1));

    let failure = if a.is_err() { a } else { b };
    assert!(matches!(
        failure,
        Err(CheckoutError::Coupon(CouponError::UsageExceeded))
    ));

    // The loser holds no stock: one unit sold, nine left.
    assert_eq!(store.stock_of(ItemRef::Simple(tee)), Some(9));
    assert_eq!(store.orders().len(), 1);
}

#[tokio::test]
async fn test_one_payment_confirmed_twice_commits_once() {
    let store = MemoryStore::new();
    let gateway = ScriptedGateway::new();
    let buyer = owner();
    let (simple, variant) = seed_two_line_cart(&store, buyer).await.unwrap();
    let service = checkout_service(store.clone(), gateway.clone());

    let intent = service.create_intent(buyer, None, None).await.unwrap();
    let payment_id = gateway.capture(&intent.gateway_order_id, intent.amount_minor, "USD");
    let sig = sign(&intent.gateway_order_id, &payment_id);

    let (a, b) = tokio::join!(
        service.confirm(buyer, &intent.gateway_order_id, &payment_id, &sig),
        service.confirm(buyer, &intent.gateway_order_id, &payment_id, &sig),
    );

    let mut created_flags = Vec::new();
    for result in [a, b] {
        match result {
            Ok((_, created)) => created_flags.push(created),
            // A loser that catches the winner mid-commit reports a
            // duplicate submission; the gateway will retry the callback.
            Err(CheckoutError::DuplicateSubmission) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(
        created_flags.iter().filter(|created| **created).count(),
        1,
        "exactly one confirmation creates the order"
    );

    assert_eq!(store.orders().len(), 1);
    assert_eq!(store.stock_of(simple), Some(4));
    assert_eq!(store.stock_of(variant), Some(0));
}
