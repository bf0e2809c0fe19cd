//! Replay, forgery, and duplicate-submission handling on the confirm
//! path. A callback may arrive twice, late, forged, or for somebody
//! else's payment; only one order may ever come out of one payment, and
//! a rejected callback must leave no trace.

#![allow(clippy::unwrap_used)]

use marram_goods_core::IntentStatus;
use marram_goods_integration_tests::{
    ScriptedGateway, checkout_service, owner, seed_two_line_cart, sign,
};
use marram_goods_storefront::db::{IntentStore, MemoryStore};
use marram_goods_storefront::gateway::GatewayPayment;
use marram_goods_storefront::services::checkout::CheckoutError;

#[tokio::test]
async fn test_replayed_callback_returns_committed_order() {
    let store = MemoryStore::new();
    let gateway = ScriptedGateway::new();
    let buyer = owner();
    let (simple, variant) = seed_two_line_cart(&store, buyer).await.unwrap();
    let service = checkout_service(store.clone(), gateway.clone());

    let intent = service.create_intent(buyer, None, None).await.unwrap();
    let payment_id = gateway.capture(&intent.gateway_order_id, intent.amount_minor, "USD");
    let sig = sign(&intent.gateway_order_id, &payment_id);

    let (first, created) = service
        .confirm(buyer, &intent.gateway_order_id, &payment_id, &sig)
        .await
        .unwrap();
    assert!(created);

    let (second, created_again) = service
        .confirm(buyer, &intent.gateway_order_id, &payment_id, &sig)
        .await
        .unwrap();
    assert!(!created_again);
    assert_eq!(second.token, first.token);

    // The replay did not touch stock again.
    assert_eq!(store.stock_of(simple), Some(4));
    assert_eq!(store.stock_of(variant), Some(0));
    assert_eq!(store.orders().len(), 1);
}

#[tokio::test]
async fn test_forged_signature_mutates_nothing() {
    let store = MemoryStore::new();
    let gateway = ScriptedGateway::new();
    let buyer = owner();
    let (simple, variant) = seed_two_line_cart(&store, buyer).await.unwrap();
    let service = checkout_service(store.clone(), gateway.clone());

    let intent = service.create_intent(buyer, None, None).await.unwrap();
    let payment_id = gateway.capture(&intent.gateway_order_id, intent.amount_minor, "USD");
    // Well-formed signature, but bound to a different order id.
    let bad_sig = sign("order_other", &payment_id);

    let result = service
        .confirm(buyer, &intent.gateway_order_id, &payment_id, &bad_sig)
        .await;

    assert!(matches!(result, Err(CheckoutError::PaymentForged)));
    assert_eq!(store.stock_of(simple), Some(5));
    assert_eq!(store.stock_of(variant), Some(2));
    assert_eq!(store.intents().first().unwrap().status, IntentStatus::Created);
    assert!(store.orders().is_empty());
}

#[tokio::test]
async fn test_uncaptured_payment_is_rejected() {
    let store = MemoryStore::new();
    let gateway = ScriptedGateway::new();
    let buyer = owner();
    seed_two_line_cart(&store, buyer).await.unwrap();
    let service = checkout_service(store.clone(), gateway.clone());

    let intent = service.create_intent(buyer, None, None).await.unwrap();
    // The gateway shows an authorization hold, not a capture.
    gateway.script_payment(GatewayPayment {
        id: "pay_hold".to_string(),
        order_id: intent.gateway_order_id.clone(),
        amount_minor: intent.amount_minor,
        currency: "USD".to_string(),
        captured: false,
    });
    let sig = sign(&intent.gateway_order_id, "pay_hold");

    let result = service
        .confirm(buyer, &intent.gateway_order_id, "pay_hold", &sig)
        .await;

    assert!(matches!(result, Err(CheckoutError::PaymentForged)));
    assert!(store.orders().is_empty());
}

#[tokio::test]
async fn test_amount_mismatch_is_rejected() {
    let store = MemoryStore::new();
    let gateway = ScriptedGateway::new();
    let buyer = owner();
    let (simple, variant) = seed_two_line_cart(&store, buyer).await.unwrap();
    let service = checkout_service(store.clone(), gateway.clone());

    let intent = service.create_intent(buyer, None, None).await.unwrap();
    // Gateway reports less money than the intent pinned.
    let payment_id = gateway.capture(&intent.gateway_order_id, intent.amount_minor - 5000, "USD");
    let sig = sign(&intent.gateway_order_id, &payment_id);

    let result = service
        .confirm(buyer, &intent.gateway_order_id, &payment_id, &sig)
        .await;

    assert!(matches!(result, Err(CheckoutError::PaymentForged)));
    assert_eq!(store.stock_of(simple), Some(5));
    assert_eq!(store.stock_of(variant), Some(2));
    assert!(store.orders().is_empty());
}

#[tokio::test]
async fn test_verification_timeout_fails_closed() {
    let store = MemoryStore::new();
    let gateway = ScriptedGateway::new();
    let buyer = owner();
    seed_two_line_cart(&store, buyer).await.unwrap();
    let service = checkout_service(store.clone(), gateway.clone());

    let intent = service.create_intent(buyer, None, None).await.unwrap();
    let payment_id = gateway.capture(&intent.gateway_order_id, intent.amount_minor, "USD");
    let sig = sign(&intent.gateway_order_id, &payment_id);
    gateway.break_fetch();

    let result = service
        .confirm(buyer, &intent.gateway_order_id, &payment_id, &sig)
        .await;

    assert!(matches!(result, Err(CheckoutError::PaymentTimeout)));
    // The intent survives for a later retry.
    assert_eq!(store.intents().first().unwrap().status, IntentStatus::Created);
    assert!(store.orders().is_empty());
}

#[tokio::test]
async fn test_callback_for_another_customer_is_rejected() {
    let store = MemoryStore::new();
    let gateway = ScriptedGateway::new();
    let buyer = owner();
    seed_two_line_cart(&store, buyer).await.unwrap();
    let service = checkout_service(store.clone(), gateway.clone());

    let intent = service.create_intent(buyer, None, None).await.unwrap();
    let payment_id = gateway.capture(&intent.gateway_order_id, intent.amount_minor, "USD");
    let sig = sign(&intent.gateway_order_id, &payment_id);

    let intruder = owner();
    let result = service
        .confirm(intruder, &intent.gateway_order_id, &payment_id, &sig)
        .await;

    assert!(matches!(result, Err(CheckoutError::Validation(_))));
    assert!(store.orders().is_empty());
}

#[tokio::test]
async fn test_unknown_gateway_order_is_rejected() {
    let store = MemoryStore::new();
    let buyer = owner();
    let service = checkout_service(store.clone(), ScriptedGateway::new());

    let sig = sign("order_ghost", "pay_ghost");
    let result = service.confirm(buyer, "order_ghost", "pay_ghost", &sig).await;

    assert!(matches!(result, Err(CheckoutError::Validation(_))));
    assert!(store.orders().is_empty());
}

#[tokio::test]
async fn test_consumed_intent_without_order_is_duplicate_submission() {
    let store = MemoryStore::new();
    let gateway = ScriptedGateway::new();
    let buyer = owner();
    seed_two_line_cart(&store, buyer).await.unwrap();
    let service = checkout_service(store.clone(), gateway.clone());

    let intent = service.create_intent(buyer, None, None).await.unwrap();
    let payment_id = gateway.capture(&intent.gateway_order_id, intent.amount_minor, "USD");
    let sig = sign(&intent.gateway_order_id, &payment_id);

    // Another confirmation holds the intent but has not committed yet.
    assert!(store.try_consume_intent(&intent.gateway_order_id).await.unwrap());

    let result = service
        .confirm(buyer, &intent.gateway_order_id, &payment_id, &sig)
        .await;

    assert!(matches!(result, Err(CheckoutError::DuplicateSubmission)));
    assert!(store.orders().is_empty());
}
