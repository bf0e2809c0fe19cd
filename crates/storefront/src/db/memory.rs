//! In-memory store for tests and local development.
//!
//! Implements every storage trait over plain vectors behind one mutex.
//! All methods are synchronous inside the lock; nothing is awaited while
//! holding it, so the `std` mutex is safe under Tokio. Semantics mirror
//! the Postgres implementations, including the compare-and-set behavior
//! of stock decrements, coupon usage, and intent consumption.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use marram_goods_core::{
    CartLineId, Coupon, CouponId, Email, IncidentId, IncidentStatus, IntentStatus, ItemRef,
    OrderId, OrderLineId, OwnerId, PaymentIntentId, ProductId, VariantId,
};
use rust_decimal::Decimal;

use super::carts::CartStore;
use super::catalog::CatalogStore;
use super::coupons::CouponStore;
use super::incidents::IncidentStore;
use super::intents::IntentStore;
use super::orders::{OrderInsertError, OrderStore};
use super::RepositoryError;
use crate::models::cart::CartLine;
use crate::models::catalog::{CatalogItem, Product, ProductVariant};
use crate::models::incident::{NewIncident, PaymentIncident};
use crate::models::intent::PaymentIntent;
use crate::models::order::{NewOrder, NewOrderLine, Order, OrderLine};
use crate::models::quote::Quote;

/// Vector-backed implementation of the full storage surface.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    products: Vec<Product>,
    variants: Vec<ProductVariant>,
    coupons: Vec<Coupon>,
    cart_lines: Vec<CartLine>,
    intents: Vec<PaymentIntent>,
    orders: Vec<Order>,
    order_lines: Vec<OrderLine>,
    incidents: Vec<PaymentIncident>,
    next_id: i32,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Insert a simple product and return its id.
    pub fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> ProductId {
        let mut inner = self.lock();
        let id = ProductId::new(inner.next_id());
        let now = Utc::now();
        inner.products.push(Product {
            id,
            name: name.to_string(),
            description: String::new(),
            price,
            image_url: None,
            stock,
            created_at: now,
            updated_at: now,
        });
        id
    }

    /// Insert a variant under an existing product and return its id.
    pub fn seed_variant(
        &self,
        product_id: ProductId,
        size: &str,
        color: &str,
        price: Decimal,
        stock: i32,
    ) -> VariantId {
        let mut inner = self.lock();
        let id = VariantId::new(inner.next_id());
        let now = Utc::now();
        inner.variants.push(ProductVariant {
            id,
            product_id,
            size: size.to_string(),
            color: color.to_string(),
            name: None,
            image_url: None,
            price,
            stock,
            created_at: now,
            updated_at: now,
        });
        id
    }

    /// Insert a coupon exactly as given.
    pub fn seed_coupon(&self, coupon: Coupon) {
        self.lock().coupons.push(coupon);
    }

    /// Delete a product, for exercising vanished-item paths.
    pub fn remove_product(&self, id: ProductId) {
        self.lock().products.retain(|p| p.id != id);
    }

    // =========================================================================
    // Test inspection
    // =========================================================================

    /// Current stock of an item, `None` if it does not exist.
    #[must_use]
    pub fn stock_of(&self, item: ItemRef) -> Option<i32> {
        let inner = self.lock();
        match item {
            ItemRef::Simple(id) => inner.products.iter().find(|p| p.id == id).map(|p| p.stock),
            ItemRef::Variant(id) => inner.variants.iter().find(|v| v.id == id).map(|v| v.stock),
        }
    }

    /// Usage count of a coupon by code.
    #[must_use]
    pub fn coupon_usage(&self, code: &str) -> Option<i32> {
        self.lock()
            .coupons
            .iter()
            .find(|c| c.code == code)
            .map(|c| c.usage_count)
    }

    /// Snapshot of all committed orders, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    /// Snapshot of all open and resolved incidents.
    #[must_use]
    pub fn incidents(&self) -> Vec<PaymentIncident> {
        self.lock().incidents.clone()
    }

    /// Snapshot of all recorded payment intents.
    #[must_use]
    pub fn intents(&self) -> Vec<PaymentIntent> {
        self.lock().intents.clone()
    }
}

// =============================================================================
// CatalogStore
// =============================================================================

impl CatalogStore for MemoryStore {
    async fn resolve_item(&self, item: ItemRef) -> Result<Option<CatalogItem>, RepositoryError> {
        let inner = self.lock();
        let resolved = match item {
            ItemRef::Simple(id) => inner.products.iter().find(|p| p.id == id).map(|p| {
                CatalogItem {
                    item,
                    display_name: p.name.clone(),
                    image_url: p.image_url.clone(),
                    unit_price: p.price,
                    stock: p.stock,
                }
            }),
            ItemRef::Variant(id) => {
                inner.variants.iter().find(|v| v.id == id).and_then(|v| {
                    let parent = inner.products.iter().find(|p| p.id == v.product_id)?;
                    Some(CatalogItem {
                        item,
                        display_name: CatalogItem::variant_display_name(v, &parent.name),
                        image_url: v.image_url.clone().or_else(|| parent.image_url.clone()),
                        unit_price: v.price,
                        stock: v.stock,
                    })
                })
            }
        };
        Ok(resolved)
    }

    async fn try_decrement_stock(
        &self,
        item: ItemRef,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.lock();
        let stock = match item {
            ItemRef::Simple(id) => inner.products.iter_mut().find(|p| p.id == id).map(|p| &mut p.stock),
            ItemRef::Variant(id) => inner.variants.iter_mut().find(|v| v.id == id).map(|v| &mut v.stock),
        };
        match stock {
            Some(stock) if *stock >= quantity => {
                *stock -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_stock(&self, item: ItemRef, quantity: i32) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        match item {
            ItemRef::Simple(id) => {
                if let Some(p) = inner.products.iter_mut().find(|p| p.id == id) {
                    p.stock += quantity;
                }
            }
            ItemRef::Variant(id) => {
                if let Some(v) = inner.variants.iter_mut().find(|v| v.id == id) {
                    v.stock += quantity;
                }
            }
        }
        Ok(())
    }

    async fn available_stock(&self, item: ItemRef) -> Result<i32, RepositoryError> {
        Ok(self.stock_of(item).unwrap_or(0))
    }
}

// =============================================================================
// CouponStore
// =============================================================================

impl CouponStore for MemoryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        Ok(self.lock().coupons.iter().find(|c| c.code == code).cloned())
    }

    async fn try_increment_usage(&self, id: CouponId) -> Result<bool, RepositoryError> {
        let mut inner = self.lock();
        match inner.coupons.iter_mut().find(|c| c.id == id) {
            Some(c) if c.is_active && c.has_remaining_uses() => {
                c.usage_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_usage(&self, id: CouponId) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        if let Some(c) = inner.coupons.iter_mut().find(|c| c.id == id) {
            c.usage_count = (c.usage_count - 1).max(0);
        }
        Ok(())
    }
}

// =============================================================================
// CartStore
// =============================================================================

impl CartStore for MemoryStore {
    async fn list_lines(&self, owner: OwnerId) -> Result<Vec<CartLine>, RepositoryError> {
        Ok(self
            .lock()
            .cart_lines
            .iter()
            .filter(|l| l.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn upsert_line(
        &self,
        owner: OwnerId,
        item: ItemRef,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<CartLine, RepositoryError> {
        let mut inner = self.lock();
        let now = Utc::now();

        if let Some(line) = inner
            .cart_lines
            .iter_mut()
            .find(|l| l.owner_id == owner && l.item == item)
        {
            line.quantity += quantity;
            line.unit_price = unit_price;
            line.updated_at = now;
            return Ok(line.clone());
        }

        let line = CartLine {
            id: CartLineId::new(inner.next_id()),
            owner_id: owner,
            item,
            quantity,
            unit_price,
            created_at: now,
            updated_at: now,
        };
        inner.cart_lines.push(line.clone());
        Ok(line)
    }

    async fn set_quantity(
        &self,
        owner: OwnerId,
        line_id: CartLineId,
        quantity: i32,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let mut inner = self.lock();
        Ok(inner
            .cart_lines
            .iter_mut()
            .find(|l| l.id == line_id && l.owner_id == owner)
            .map(|line| {
                line.quantity = quantity;
                line.updated_at = Utc::now();
                line.clone()
            }))
    }

    async fn remove_line(
        &self,
        owner: OwnerId,
        line_id: CartLineId,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.lock();
        let before = inner.cart_lines.len();
        inner
            .cart_lines
            .retain(|l| !(l.id == line_id && l.owner_id == owner));
        Ok(inner.cart_lines.len() < before)
    }

    async fn clear_cart(&self, owner: OwnerId) -> Result<(), RepositoryError> {
        self.lock().cart_lines.retain(|l| l.owner_id != owner);
        Ok(())
    }
}

// =============================================================================
// IntentStore
// =============================================================================

impl IntentStore for MemoryStore {
    async fn insert_intent(
        &self,
        gateway_order_id: &str,
        owner: OwnerId,
        customer_email: Option<&Email>,
        amount_minor: i64,
        currency: &str,
        quote: &Quote,
    ) -> Result<PaymentIntent, RepositoryError> {
        let mut inner = self.lock();
        if inner
            .intents
            .iter()
            .any(|i| i.gateway_order_id == gateway_order_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "payment intent for gateway order {gateway_order_id} already exists"
            )));
        }

        let intent = PaymentIntent {
            id: PaymentIntentId::new(inner.next_id()),
            gateway_order_id: gateway_order_id.to_string(),
            owner_id: owner,
            customer_email: customer_email.cloned(),
            amount_minor,
            currency: currency.to_string(),
            status: IntentStatus::Created,
            quote: quote.clone(),
            created_at: Utc::now(),
        };
        inner.intents.push(intent.clone());
        Ok(intent)
    }

    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<PaymentIntent>, RepositoryError> {
        Ok(self
            .lock()
            .intents
            .iter()
            .find(|i| i.gateway_order_id == gateway_order_id)
            .cloned())
    }

    async fn try_consume_intent(&self, gateway_order_id: &str) -> Result<bool, RepositoryError> {
        let mut inner = self.lock();
        match inner
            .intents
            .iter_mut()
            .find(|i| i.gateway_order_id == gateway_order_id && i.status == IntentStatus::Created)
        {
            Some(intent) => {
                intent.status = IntentStatus::Consumed;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// OrderStore
// =============================================================================

impl OrderStore for MemoryStore {
    async fn insert_order(
        &self,
        token: &str,
        order: &NewOrder,
        lines: &[NewOrderLine],
    ) -> Result<Order, OrderInsertError> {
        let mut inner = self.lock();

        if inner.orders.iter().any(|o| o.token == token) {
            return Err(OrderInsertError::TokenCollision);
        }
        if let (Some(goid), Some(gpid)) = (&order.gateway_order_id, &order.gateway_payment_id) {
            let duplicate = inner.orders.iter().any(|o| {
                o.gateway_order_id.as_ref() == Some(goid)
                    && o.gateway_payment_id.as_ref() == Some(gpid)
            });
            if duplicate {
                return Err(OrderInsertError::DuplicateGatewayPair);
            }
        }

        let now = Utc::now();
        let order_id = OrderId::new(inner.next_id());
        let stored = Order {
            id: order_id,
            token: token.to_string(),
            owner_id: order.owner_id,
            customer_email: order.customer_email.clone(),
            subtotal: order.subtotal,
            discount: order.discount,
            shipping: order.shipping,
            tax: order.tax,
            total: order.total,
            coupon_code: order.coupon_code.clone(),
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            fulfillment_status: marram_goods_core::FulfillmentStatus::Pending,
            gateway_order_id: order.gateway_order_id.clone(),
            gateway_payment_id: order.gateway_payment_id.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.orders.push(stored.clone());

        for line in lines {
            let line_id = OrderLineId::new(inner.next_id());
            inner.order_lines.push(OrderLine {
                id: line_id,
                order_id,
                item: line.item,
                display_name: line.display_name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                line_total: line.line_total,
            });
        }

        Ok(stored)
    }

    async fn find_by_gateway_pair(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .find(|o| {
                o.gateway_order_id.as_deref() == Some(gateway_order_id)
                    && o.gateway_payment_id.as_deref() == Some(gateway_payment_id)
            })
            .cloned())
    }

    async fn list_orders_for_owner(&self, owner: OwnerId) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .rev()
            .filter(|o| o.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn find_order_by_token_for_owner(
        &self,
        owner: OwnerId,
        token: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .find(|o| o.token == token && o.owner_id == owner)
            .cloned())
    }

    async fn list_order_lines(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderLine>, RepositoryError> {
        Ok(self
            .lock()
            .order_lines
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect())
    }
}

// =============================================================================
// IncidentStore
// =============================================================================

impl IncidentStore for MemoryStore {
    async fn insert_incident(
        &self,
        incident: &NewIncident,
    ) -> Result<PaymentIncident, RepositoryError> {
        let mut inner = self.lock();
        let stored = PaymentIncident {
            id: IncidentId::new(inner.next_id()),
            gateway_order_id: incident.gateway_order_id.clone(),
            gateway_payment_id: incident.gateway_payment_id.clone(),
            owner_id: incident.owner_id,
            amount_minor: incident.amount_minor,
            reason: incident.reason,
            detail: incident.detail.clone(),
            status: IncidentStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
        };
        inner.incidents.push(stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marram_goods_core::PaymentMethod;
    use marram_goods_core::PaymentStatus;
    use uuid::Uuid;

    use super::*;

    fn owner() -> OwnerId {
        OwnerId::from(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_upsert_line_merges_quantities() {
        let store = MemoryStore::new();
        let product = store.seed_product("Dune Tee", Decimal::new(10000, 2), 5);
        let owner = owner();
        let item = ItemRef::Simple(product);

        store
            .upsert_line(owner, item, 1, Decimal::new(10000, 2))
            .await
            .unwrap();
        let line = store
            .upsert_line(owner, item, 2, Decimal::new(10000, 2))
            .await
            .unwrap();

        assert_eq!(line.quantity, 3);
        assert_eq!(store.list_lines(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_decrement_respects_available_stock() {
        let store = MemoryStore::new();
        let product = store.seed_product("Dune Tee", Decimal::new(10000, 2), 2);
        let item = ItemRef::Simple(product);

        assert!(store.try_decrement_stock(item, 2).await.unwrap());
        assert!(!store.try_decrement_stock(item, 1).await.unwrap());
        assert_eq!(store.available_stock(item).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_intent_consumes_exactly_once() {
        let store = MemoryStore::new();
        let quote = Quote::default();
        store
            .insert_intent("order_abc", owner(), None, 18000, "USD", &quote)
            .await
            .unwrap();

        assert!(store.try_consume_intent("order_abc").await.unwrap());
        assert!(!store.try_consume_intent("order_abc").await.unwrap());
        assert!(!store.try_consume_intent("order_missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_order_rejects_duplicate_gateway_pair() {
        let store = MemoryStore::new();
        let new_order = NewOrder {
            owner_id: owner(),
            customer_email: None,
            subtotal: Decimal::new(20000, 2),
            discount: Decimal::ZERO,
            shipping: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::new(20000, 2),
            coupon_code: None,
            payment_method: PaymentMethod::Gateway,
            payment_status: PaymentStatus::Paid,
            gateway_order_id: Some("order_abc".to_string()),
            gateway_payment_id: Some("pay_xyz".to_string()),
        };

        store.insert_order("MG-AAAA1111", &new_order, &[]).await.unwrap();

        let token_clash = store.insert_order("MG-AAAA1111", &new_order, &[]).await;
        assert!(matches!(token_clash, Err(OrderInsertError::TokenCollision)));

        let pair_clash = store.insert_order("MG-BBBB2222", &new_order, &[]).await;
        assert!(matches!(
            pair_clash,
            Err(OrderInsertError::DuplicateGatewayPair)
        ));
    }
}
