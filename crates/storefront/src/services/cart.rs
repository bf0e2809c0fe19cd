//! Cart aggregation: resolving cart lines into a priced quote.
//!
//! Prices always come from the live catalog at aggregation time, never
//! from what was captured when the line was added. A requested quantity
//! above current stock fails the whole aggregation with the number of
//! units still available, so the client can offer a reduced quantity.

use chrono::{DateTime, Utc};
use marram_goods_core::{Coupon, OwnerId, Price, round_to_cents};
use rust_decimal::Decimal;

use super::checkout::CheckoutError;
use crate::config::PricingConfig;
use crate::db::CommerceStore;
use crate::models::quote::{PricedLine, Quote};

/// Resolve an owner's cart and price it, applying the coupon if given.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] if no lines survive resolution,
/// [`CheckoutError::OutOfStock`] if any line wants more than is in stock,
/// [`CheckoutError::Coupon`] if the coupon does not apply.
pub async fn build_quote<S: CommerceStore>(
    store: &S,
    pricing: &PricingConfig,
    owner: OwnerId,
    coupon_code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Quote, CheckoutError> {
    let lines = resolve_lines(store, owner).await?;
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();

    let (discount, applied_code) = match coupon_code {
        Some(code) => {
            let coupon = lookup_coupon(store, code).await?;
            let discount = coupon.validate(now, subtotal)?;
            (discount, Some(coupon.code))
        }
        None => (Decimal::ZERO, None),
    };

    price_quote(lines, subtotal, discount, applied_code, pricing)
}

/// Resolve every cart line against the live catalog.
///
/// Lines whose item has been removed from the catalog are dropped; the
/// cart simply no longer contains them.
///
/// # Errors
///
/// Returns [`CheckoutError::OutOfStock`] if a line wants more than is in
/// stock, [`CheckoutError::Store`] if a query fails.
pub async fn resolve_lines<S: CommerceStore>(
    store: &S,
    owner: OwnerId,
) -> Result<Vec<PricedLine>, CheckoutError> {
    let cart_lines = store.list_lines(owner).await?;

    let mut lines = Vec::with_capacity(cart_lines.len());
    for line in cart_lines {
        let Some(item) = store.resolve_item(line.item).await? else {
            continue;
        };

        if line.quantity > item.stock {
            return Err(CheckoutError::OutOfStock {
                item: line.item,
                available: item.stock,
            });
        }

        lines.push(PricedLine {
            item: line.item,
            display_name: item.display_name,
            image_url: item.image_url,
            unit_price: item.unit_price,
            quantity: line.quantity,
            line_total: item.unit_price * Decimal::from(line.quantity),
        });
    }

    Ok(lines)
}

async fn lookup_coupon<S: CommerceStore>(
    store: &S,
    code: &str,
) -> Result<Coupon, CheckoutError> {
    let normalized = Coupon::normalize_code(code);
    store
        .find_by_code(&normalized)
        .await?
        .ok_or(CheckoutError::Coupon(
            marram_goods_core::CouponError::NotFound,
        ))
}

fn price_quote(
    lines: Vec<PricedLine>,
    subtotal: Decimal,
    discount: Decimal,
    coupon_code: Option<String>,
    pricing: &PricingConfig,
) -> Result<Quote, CheckoutError> {
    let discounted = subtotal - discount;
    let shipping = shipping_fee(discounted, pricing);
    let tax = round_to_cents(discounted * pricing.tax_percent / Decimal::ONE_HUNDRED);
    let total = discounted + shipping + tax;

    let amount_minor = Price::new(total, pricing.currency)
        .minor_units()
        .ok_or_else(|| {
            CheckoutError::Validation("order total is not representable in minor units".to_string())
        })?;

    Ok(Quote {
        lines,
        subtotal,
        discount,
        coupon_code,
        shipping,
        tax,
        total,
        currency: pricing.currency,
        amount_minor,
    })
}

fn shipping_fee(discounted_subtotal: Decimal, pricing: &PricingConfig) -> Decimal {
    if pricing.shipping_fee.is_zero() {
        return Decimal::ZERO;
    }
    // A zero threshold means shipping is never waived.
    if !pricing.free_shipping_threshold.is_zero()
        && discounted_subtotal >= pricing.free_shipping_threshold
    {
        return Decimal::ZERO;
    }
    pricing.shipping_fee
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use marram_goods_core::{CouponError, CouponId, ItemRef};
    use uuid::Uuid;

    use super::*;
    use crate::db::{CartStore, MemoryStore};

    fn owner() -> OwnerId {
        OwnerId::from(Uuid::new_v4())
    }

    fn coupon(code: &str, percent: i32, min: Decimal) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(900),
            code: code.to_string(),
            discount_percent: percent,
            min_order_amount: min,
            valid_from: now - Duration::days(1),
            valid_to: now + Duration::days(1),
            usage_limit: None,
            usage_count: 0,
            is_active: true,
        }
    }

    async fn seeded_cart(store: &MemoryStore, owner: OwnerId) {
        let tee = store.seed_product("Dune Tee", Decimal::new(10000, 2), 5);
        let parent = store.seed_product("Marram Hoodie", Decimal::new(9000, 2), 9);
        let hoodie_m = store.seed_variant(parent, "M", "Sand", Decimal::new(5000, 2), 2);

        store
            .upsert_line(owner, ItemRef::Simple(tee), 1, Decimal::new(10000, 2))
            .await
            .unwrap();
        store
            .upsert_line(owner, ItemRef::Variant(hoodie_m), 2, Decimal::new(5000, 2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_quote_applies_percentage_coupon() {
        let store = MemoryStore::new();
        let owner = owner();
        seeded_cart(&store, owner).await;
        store.seed_coupon(coupon("SAVE10", 10, Decimal::new(10000, 2)));

        let quote = build_quote(
            &store,
            &PricingConfig::default(),
            owner,
            Some("save10"),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(quote.subtotal, Decimal::new(20000, 2));
        assert_eq!(quote.discount, Decimal::new(2000, 2));
        assert_eq!(quote.total, Decimal::new(18000, 2));
        assert_eq!(quote.amount_minor, 18000);
        assert_eq!(quote.coupon_code.as_deref(), Some("SAVE10"));
        assert_eq!(quote.item_count(), 3);
    }

    #[tokio::test]
    async fn test_quote_without_coupon() {
        let store = MemoryStore::new();
        let owner = owner();
        seeded_cart(&store, owner).await;

        let quote = build_quote(&store, &PricingConfig::default(), owner, None, Utc::now())
            .await
            .unwrap();

        assert_eq!(quote.subtotal, Decimal::new(20000, 2));
        assert_eq!(quote.discount, Decimal::ZERO);
        assert_eq!(quote.total, Decimal::new(20000, 2));
        assert!(quote.coupon_code.is_none());
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let store = MemoryStore::new();

        let result =
            build_quote(&store, &PricingConfig::default(), owner(), None, Utc::now()).await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_over_stock_line_reports_available() {
        let store = MemoryStore::new();
        let owner = owner();
        let tee = store.seed_product("Dune Tee", Decimal::new(10000, 2), 2);
        store
            .upsert_line(owner, ItemRef::Simple(tee), 3, Decimal::new(10000, 2))
            .await
            .unwrap();

        let result =
            build_quote(&store, &PricingConfig::default(), owner, None, Utc::now()).await;

        match result {
            Err(CheckoutError::OutOfStock { item, available }) => {
                assert_eq!(item, ItemRef::Simple(tee));
                assert_eq!(available, 2);
            }
            other => panic!("expected OutOfStock, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_coupon_code() {
        let store = MemoryStore::new();
        let owner = owner();
        seeded_cart(&store, owner).await;

        let result = build_quote(
            &store,
            &PricingConfig::default(),
            owner,
            Some("NOPE"),
            Utc::now(),
        )
        .await;

        assert!(matches!(
            result,
            Err(CheckoutError::Coupon(CouponError::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_shipping_charged_below_threshold_and_waived_above() {
        let pricing = PricingConfig {
            shipping_fee: Decimal::new(1000, 2),
            free_shipping_threshold: Decimal::new(50000, 2),
            ..PricingConfig::default()
        };

        let store = MemoryStore::new();
        let owner = owner();
        seeded_cart(&store, owner).await;

        let quote = build_quote(&store, &pricing, owner, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(quote.shipping, Decimal::new(1000, 2));
        assert_eq!(quote.total, Decimal::new(21000, 2));

        // Push the cart over the free-shipping threshold.
        let crate_of_tees = store.seed_product("Tee Crate", Decimal::new(60000, 2), 3);
        store
            .upsert_line(owner, ItemRef::Simple(crate_of_tees), 1, Decimal::new(60000, 2))
            .await
            .unwrap();

        let quote = build_quote(&store, &pricing, owner, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(quote.shipping, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_tax_applies_to_discounted_subtotal() {
        let pricing = PricingConfig {
            tax_percent: Decimal::new(10, 0),
            ..PricingConfig::default()
        };

        let store = MemoryStore::new();
        let owner = owner();
        seeded_cart(&store, owner).await;
        store.seed_coupon(coupon("SAVE10", 10, Decimal::new(10000, 2)));

        let quote = build_quote(&store, &pricing, owner, Some("SAVE10"), Utc::now())
            .await
            .unwrap();

        // 10% of the discounted 180.00, not of the 200.00 subtotal.
        assert_eq!(quote.tax, Decimal::new(1800, 2));
        assert_eq!(quote.total, Decimal::new(19800, 2));
    }
}
