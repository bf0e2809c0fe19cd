//! Shared fixtures for the integration suites.
//!
//! The suites drive the real checkout pipeline in process: the
//! in-memory store stands in for Postgres with the same compare-and-set
//! semantics, and [`ScriptedGateway`] plays the payment gateway without
//! any network. Callback signatures come from the production HMAC
//! helper, so the verification path under test is the real one.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p marram-goods-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};
use marram_goods_core::{Coupon, CouponId, ItemRef, OwnerId};
use marram_goods_storefront::config::PricingConfig;
use marram_goods_storefront::db::{CartStore, CatalogStore, MemoryStore, RepositoryError};
use marram_goods_storefront::gateway::{
    GatewayError, GatewayOrder, GatewayPayment, PaymentGateway, signature,
};
use marram_goods_storefront::services::checkout::CheckoutService;
use rust_decimal::Decimal;
use secrecy::SecretString;
use uuid::Uuid;

/// Payment gateway double scripted entirely from the test.
///
/// `create_order` hands out sequential gateway order ids and remembers
/// the registered amount. Payments exist only after the test records
/// them with [`ScriptedGateway::capture`] or
/// [`ScriptedGateway::script_payment`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    inner: Arc<Mutex<GatewayInner>>,
}

#[derive(Debug, Default)]
struct GatewayInner {
    next_id: u32,
    orders: Vec<GatewayOrder>,
    payments: Vec<GatewayPayment>,
    fetch_times_out: bool,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GatewayInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a captured payment against a gateway order, as the real
    /// gateway would once the customer pays. Returns the payment id the
    /// browser callback will carry.
    pub fn capture(&self, gateway_order_id: &str, amount_minor: i64, currency: &str) -> String {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = format!("pay_{:04}", inner.next_id);
        inner.payments.push(GatewayPayment {
            id: id.clone(),
            order_id: gateway_order_id.to_string(),
            amount_minor,
            currency: currency.to_string(),
            captured: true,
        });
        id
    }

    /// Record a payment verbatim, for contradiction cases: uncaptured
    /// holds, wrong amounts, wrong orders.
    pub fn script_payment(&self, payment: GatewayPayment) {
        self.lock().payments.push(payment);
    }

    /// Make every subsequent `fetch_payment` time out.
    pub fn break_fetch(&self) {
        self.lock().fetch_times_out = true;
    }

    /// Orders registered so far, in creation order.
    #[must_use]
    pub fn orders(&self) -> Vec<GatewayOrder> {
        self.lock().orders.clone()
    }
}

impl PaymentGateway for ScriptedGateway {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        _receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let order = GatewayOrder {
            id: format!("order_{:04}", inner.next_id),
            amount_minor,
            currency: currency.to_string(),
        };
        inner.orders.push(order.clone());
        Ok(order)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let inner = self.lock();
        if inner.fetch_times_out {
            return Err(GatewayError::Timeout);
        }
        inner
            .payments
            .iter()
            .find(|p| p.id == payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Api {
                status: 404,
                message: format!("payment {payment_id} not found"),
            })
    }
}

/// The webhook secret every suite signs with.
#[must_use]
pub fn webhook_secret() -> SecretString {
    SecretString::from("integration-webhook-secret-00000")
}

/// A fresh anonymous customer reference.
#[must_use]
pub fn owner() -> OwnerId {
    OwnerId::from(Uuid::new_v4())
}

/// The service under test, with default pricing and no mailer or alerts.
#[must_use]
pub fn checkout_service(
    store: MemoryStore,
    gateway: ScriptedGateway,
) -> CheckoutService<MemoryStore, ScriptedGateway> {
    CheckoutService::new(store, gateway, PricingConfig::default(), webhook_secret())
}

/// Sign a callback pair with the shared test secret.
#[must_use]
pub fn sign(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    // HMAC-SHA256 accepts keys of any length, so compute cannot fail.
    signature::compute(&webhook_secret(), gateway_order_id, gateway_payment_id)
        .expect("HMAC accepts any key length")
}

/// An active percentage coupon with a validity window around now and no
/// usage limit. Tests tighten individual fields before seeding.
#[must_use]
pub fn percent_coupon(code: &str, percent: i32, min_order: Decimal) -> Coupon {
    Coupon {
        id: CouponId::new(700),
        code: code.to_string(),
        discount_percent: percent,
        min_order_amount: min_order,
        valid_from: Utc::now() - Duration::days(1),
        valid_to: Utc::now() + Duration::days(1),
        usage_limit: None,
        usage_count: 0,
        is_active: true,
    }
}

/// Put `quantity` units of an item in the owner's cart at its current
/// catalog price.
///
/// # Errors
///
/// Propagates store failures; the in-memory store does not produce any.
pub async fn add_line(
    store: &MemoryStore,
    owner: OwnerId,
    item: ItemRef,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let unit_price = store
        .resolve_item(item)
        .await?
        .map_or(Decimal::ZERO, |found| found.unit_price);
    store.upsert_line(owner, item, quantity, unit_price).await?;
    Ok(())
}

/// Seed the canonical two-line cart: one unit of a 100.00 product with
/// five in stock, and two units of a 50.00 variant with two in stock.
/// Subtotal 200.00.
///
/// # Errors
///
/// Propagates store failures; the in-memory store does not produce any.
pub async fn seed_two_line_cart(
    store: &MemoryStore,
    owner: OwnerId,
) -> Result<(ItemRef, ItemRef), RepositoryError> {
    let tee = store.seed_product("Dune Tee", Decimal::new(10000, 2), 5);
    let parent = store.seed_product("Marram Hoodie", Decimal::new(9000, 2), 9);
    let hoodie_m = store.seed_variant(parent, "M", "Sand", Decimal::new(5000, 2), 2);

    let simple = ItemRef::Simple(tee);
    let variant = ItemRef::Variant(hoodie_m);
    add_line(store, owner, simple, 1).await?;
    add_line(store, owner, variant, 2).await?;
    Ok((simple, variant))
}
