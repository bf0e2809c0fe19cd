//! Checkout orchestration: quotes, payment intents, and order commits.
//!
//! Two paths lead to a committed order. The direct path (pay on
//! delivery) prices the live cart, reserves stock, consumes the coupon,
//! and persists in one request; every failure is user-facing because no
//! money has moved. The gateway path splits across two requests: intent
//! creation pins a quote and registers the amount with the gateway, and
//! the confirm callback verifies the payment, then commits from the
//! pinned quote. On the confirm path money has already been captured, so
//! commit failures do not bubble up as retryable errors; they open a
//! payment incident for manual reconciliation and tell the customer not
//! to pay again.

use chrono::Utc;
use marram_goods_core::{CouponError, CouponId, Email, ItemRef, OwnerId, PaymentMethod, PaymentStatus};
use rand::Rng;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use super::cart;
use super::email::EmailService;
use super::stock;
use crate::config::PricingConfig;
use crate::db::{CommerceStore, OrderInsertError, RepositoryError};
use crate::error::add_breadcrumb;
use crate::gateway::{GatewayError, PaymentGateway, signature};
use crate::models::incident::{IncidentReason, NewIncident};
use crate::models::intent::PaymentIntent;
use crate::models::order::{NewOrder, NewOrderLine, Order};
use crate::models::quote::Quote;
use crate::slack::SlackClient;

/// Failures across the checkout pipeline.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request itself is malformed or inconsistent.
    #[error("{0}")]
    Validation(String),

    /// Checkout requires at least one resolvable cart line.
    #[error("cart is empty")]
    EmptyCart,

    /// A line wants more units than are in stock right now.
    #[error("insufficient stock for {item}: {available} available")]
    OutOfStock { item: ItemRef, available: i32 },

    /// The coupon does not apply to this cart.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// The callback signature did not verify, or the gateway's record of
    /// the payment contradicts the callback. Nothing was mutated.
    #[error("payment verification failed")]
    PaymentForged,

    /// The gateway did not answer in time; the payment state is unknown.
    #[error("payment verification timed out")]
    PaymentTimeout,

    /// A concurrent confirmation of the same payment is in flight.
    #[error("this payment is already being processed")]
    DuplicateSubmission,

    /// Money was captured but the order could not be committed. An
    /// incident has been opened; the customer must not pay again.
    #[error("payment captured but order not committed: {detail}")]
    PaidButUncommitted { detail: String },

    /// The gateway answered with an error.
    #[error("payment gateway error: {0}")]
    Gateway(GatewayError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl From<GatewayError> for CheckoutError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout => Self::PaymentTimeout,
            other => Self::Gateway(other),
        }
    }
}

/// Alphabet for order tokens: uppercase alphanumerics minus the
/// lookalikes 0/O and 1/I, so tokens survive being read over the phone.
const TOKEN_CHARSET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
const TOKEN_SUFFIX_LENGTH: usize = 8;
const TOKEN_INSERT_ATTEMPTS: u32 = 5;

/// Generate a candidate order token, e.g. `MG-7F3KQ2XN`.
fn generate_order_token() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..TOKEN_SUFFIX_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..TOKEN_CHARSET.len());
            // random_range(0..len) keeps idx in bounds.
            char::from(*TOKEN_CHARSET.get(idx).expect("index in charset range"))
        })
        .collect();
    format!("MG-{suffix}")
}

/// The checkout pipeline, generic over storage and the payment gateway.
#[derive(Debug, Clone)]
pub struct CheckoutService<S, G> {
    store: S,
    gateway: G,
    pricing: PricingConfig,
    webhook_secret: SecretString,
    mailer: Option<EmailService>,
    alerts: Option<SlackClient>,
}

impl<S: CommerceStore, G: PaymentGateway> CheckoutService<S, G> {
    pub fn new(store: S, gateway: G, pricing: PricingConfig, webhook_secret: SecretString) -> Self {
        Self {
            store,
            gateway,
            pricing,
            webhook_secret,
            mailer: None,
            alerts: None,
        }
    }

    /// Attach an order-confirmation mailer.
    #[must_use]
    pub fn with_mailer(mut self, mailer: EmailService) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Attach a Slack client for payment incident alerts.
    #[must_use]
    pub fn with_alerts(mut self, alerts: SlackClient) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Price the owner's cart without committing anything.
    ///
    /// # Errors
    ///
    /// See [`cart::build_quote`].
    pub async fn quote(
        &self,
        owner: OwnerId,
        coupon_code: Option<&str>,
    ) -> Result<Quote, CheckoutError> {
        cart::build_quote(&self.store, &self.pricing, owner, coupon_code, Utc::now()).await
    }

    /// Start a gateway checkout: price the cart, register the total with
    /// the gateway, and pin the quote to the returned gateway order id.
    ///
    /// # Errors
    ///
    /// Quote errors as in [`Self::quote`]; gateway failures surface as
    /// [`CheckoutError::Gateway`] or [`CheckoutError::PaymentTimeout`].
    #[instrument(skip(self, email), fields(owner = %owner))]
    pub async fn create_intent(
        &self,
        owner: OwnerId,
        coupon_code: Option<&str>,
        email: Option<Email>,
    ) -> Result<PaymentIntent, CheckoutError> {
        let quote =
            cart::build_quote(&self.store, &self.pricing, owner, coupon_code, Utc::now()).await?;
        let currency = quote.currency.as_str();

        let gateway_order = self
            .gateway
            .create_order(quote.amount_minor, currency, &owner.to_string())
            .await?;
        if gateway_order.amount_minor != quote.amount_minor {
            return Err(CheckoutError::Gateway(GatewayError::Parse(format!(
                "gateway registered amount {} for requested {}",
                gateway_order.amount_minor, quote.amount_minor
            ))));
        }
        add_breadcrumb(
            "checkout",
            "Gateway order registered",
            Some(&[("gateway_order_id", gateway_order.id.as_str())]),
        );

        let intent = self
            .store
            .insert_intent(
                &gateway_order.id,
                owner,
                email.as_ref(),
                quote.amount_minor,
                currency,
                &quote,
            )
            .await?;

        info!(
            gateway_order_id = %intent.gateway_order_id,
            amount_minor = intent.amount_minor,
            "Payment intent created"
        );
        Ok(intent)
    }

    /// Handle the gateway payment callback and materialize the order.
    ///
    /// Returns the order and whether this call created it; a replayed
    /// callback for an already-committed payment returns the existing
    /// order with `false`.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::PaymentForged`] if the signature or the gateway's
    /// payment record does not check out (nothing is mutated);
    /// [`CheckoutError::PaymentTimeout`] if the gateway cannot be reached
    /// in time; [`CheckoutError::DuplicateSubmission`] if a concurrent
    /// confirmation holds the intent; [`CheckoutError::PaidButUncommitted`]
    /// if money was captured but the commit failed.
    #[instrument(skip(self, sig), fields(owner = %owner, gateway_order_id = %gateway_order_id))]
    pub async fn confirm(
        &self,
        owner: OwnerId,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        sig: &str,
    ) -> Result<(Order, bool), CheckoutError> {
        // Local signature check before anything is read or written.
        signature::verify(&self.webhook_secret, gateway_order_id, gateway_payment_id, sig)
            .map_err(|e| {
                warn!(error = %e, "Callback signature rejected");
                CheckoutError::PaymentForged
            })?;

        // Replay of a payment that already committed: return its order.
        if let Some(existing) = self
            .store
            .find_by_gateway_pair(gateway_order_id, gateway_payment_id)
            .await?
        {
            if existing.owner_id != owner {
                return Err(CheckoutError::Validation(
                    "payment does not belong to this customer".to_string(),
                ));
            }
            info!(token = %existing.token, "Replayed callback for committed payment");
            return Ok((existing, false));
        }

        let intent = self
            .store
            .find_by_gateway_order_id(gateway_order_id)
            .await?
            .ok_or_else(|| CheckoutError::Validation("unknown payment intent".to_string()))?;
        if intent.owner_id != owner {
            return Err(CheckoutError::Validation(
                "payment does not belong to this customer".to_string(),
            ));
        }

        // The browser's claim is not enough: ask the gateway what it
        // actually did, and compare against the pinned intent.
        let payment = self.gateway.fetch_payment(gateway_payment_id).await?;
        if !payment.captured
            || payment.order_id != intent.gateway_order_id
            || payment.amount_minor != intent.amount_minor
        {
            warn!(
                captured = payment.captured,
                payment_order_id = %payment.order_id,
                payment_amount_minor = payment.amount_minor,
                intent_amount_minor = intent.amount_minor,
                "Gateway payment record contradicts callback"
            );
            return Err(CheckoutError::PaymentForged);
        }
        add_breadcrumb(
            "checkout",
            "Payment verified with gateway",
            Some(&[("gateway_payment_id", payment.id.as_str())]),
        );

        // Single-use gate. Losing the race means either the winner has
        // already committed (replay) or is still committing (duplicate).
        if !self.store.try_consume_intent(gateway_order_id).await? {
            return match self
                .store
                .find_by_gateway_pair(gateway_order_id, gateway_payment_id)
                .await?
            {
                Some(existing) => Ok((existing, false)),
                None => Err(CheckoutError::DuplicateSubmission),
            };
        }

        self.commit_paid_order(owner, &intent, gateway_payment_id)
            .await
            .map(|order| (order, true))
    }

    /// Commit an order whose payment has been captured and verified.
    /// Failures here must not read as retryable: they open an incident
    /// and surface as [`CheckoutError::PaidButUncommitted`].
    async fn commit_paid_order(
        &self,
        owner: OwnerId,
        intent: &PaymentIntent,
        gateway_payment_id: &str,
    ) -> Result<Order, CheckoutError> {
        let gateway_order_id = intent.gateway_order_id.as_str();

        if let Err(stock_err) = stock::commit_lines(&self.store, &intent.quote.lines).await {
            let detail = format!("stock commit failed: {stock_err}");
            self.open_incident(
                gateway_order_id,
                Some(gateway_payment_id),
                owner,
                intent.amount_minor,
                IncidentReason::StockCommitFailed,
                &detail,
            )
            .await;
            return Err(CheckoutError::PaidButUncommitted { detail });
        }
        add_breadcrumb("checkout", "Stock committed", None);

        let mut consumed_coupon = None;
        if let Some(code) = intent.quote.coupon_code.clone() {
            match self.consume_coupon(&code).await {
                Ok(consumed) => consumed_coupon = consumed,
                Err(detail) => {
                    stock::release_lines(&self.store, &intent.quote.lines).await;
                    self.open_incident(
                        gateway_order_id,
                        Some(gateway_payment_id),
                        owner,
                        intent.amount_minor,
                        IncidentReason::CouponExhausted,
                        &detail,
                    )
                    .await;
                    return Err(CheckoutError::PaidButUncommitted { detail });
                }
            }
        }

        let new_order = NewOrder {
            owner_id: owner,
            customer_email: intent.customer_email.clone(),
            subtotal: intent.quote.subtotal,
            discount: intent.quote.discount,
            shipping: intent.quote.shipping,
            tax: intent.quote.tax,
            total: intent.quote.total,
            coupon_code: intent.quote.coupon_code.clone(),
            payment_method: PaymentMethod::Gateway,
            payment_status: PaymentStatus::Paid,
            gateway_order_id: Some(gateway_order_id.to_string()),
            gateway_payment_id: Some(gateway_payment_id.to_string()),
        };
        let lines = order_lines_from_quote(&intent.quote);

        match self.insert_with_token_retries(&new_order, &lines).await {
            Ok(order) => {
                info!(token = %order.token, total = %order.total, "Order committed from gateway payment");
                self.finish_order(&order, &lines).await;
                Ok(order)
            }
            Err(OrderInsertError::DuplicateGatewayPair) => {
                // Database-level idempotency backstop fired; someone else
                // committed this payment. Undo our half and hand back theirs.
                self.rollback_commit(&intent.quote, consumed_coupon).await;
                match self
                    .store
                    .find_by_gateway_pair(gateway_order_id, gateway_payment_id)
                    .await?
                {
                    Some(existing) => Ok(existing),
                    None => {
                        let detail =
                            "duplicate gateway pair reported but no order found".to_string();
                        self.open_incident(
                            gateway_order_id,
                            Some(gateway_payment_id),
                            owner,
                            intent.amount_minor,
                            IncidentReason::OrderPersistFailed,
                            &detail,
                        )
                        .await;
                        Err(CheckoutError::PaidButUncommitted { detail })
                    }
                }
            }
            Err(e) => {
                self.rollback_commit(&intent.quote, consumed_coupon).await;
                let detail = format!("order persist failed: {e}");
                self.open_incident(
                    gateway_order_id,
                    Some(gateway_payment_id),
                    owner,
                    intent.amount_minor,
                    IncidentReason::OrderPersistFailed,
                    &detail,
                )
                .await;
                Err(CheckoutError::PaidButUncommitted { detail })
            }
        }
    }

    /// Place an order paid on delivery. The live cart is priced and
    /// committed in this one request; every failure is user-facing.
    ///
    /// # Errors
    ///
    /// Quote errors as in [`Self::quote`];
    /// [`CheckoutError::OutOfStock`] if reservation fails;
    /// [`CheckoutError::Coupon`] if the coupon cannot be consumed.
    #[instrument(skip(self, email), fields(owner = %owner))]
    pub async fn direct(
        &self,
        owner: OwnerId,
        coupon_code: Option<&str>,
        email: Option<Email>,
    ) -> Result<Order, CheckoutError> {
        let quote =
            cart::build_quote(&self.store, &self.pricing, owner, coupon_code, Utc::now()).await?;

        stock::commit_lines(&self.store, &quote.lines).await?;

        let mut consumed_coupon = None;
        if let Some(code) = quote.coupon_code.clone() {
            match self.store.find_by_code(&code).await {
                Ok(Some(coupon)) => match self.store.try_increment_usage(coupon.id).await {
                    Ok(true) => consumed_coupon = Some(coupon.id),
                    Ok(false) => {
                        stock::release_lines(&self.store, &quote.lines).await;
                        return Err(CheckoutError::Coupon(CouponError::UsageExceeded));
                    }
                    Err(e) => {
                        stock::release_lines(&self.store, &quote.lines).await;
                        return Err(CheckoutError::Store(e));
                    }
                },
                Ok(None) => {
                    stock::release_lines(&self.store, &quote.lines).await;
                    return Err(CheckoutError::Coupon(CouponError::NotFound));
                }
                Err(e) => {
                    stock::release_lines(&self.store, &quote.lines).await;
                    return Err(CheckoutError::Store(e));
                }
            }
        }

        let new_order = NewOrder {
            owner_id: owner,
            customer_email: email,
            subtotal: quote.subtotal,
            discount: quote.discount,
            shipping: quote.shipping,
            tax: quote.tax,
            total: quote.total,
            coupon_code: quote.coupon_code.clone(),
            payment_method: PaymentMethod::Direct,
            payment_status: PaymentStatus::Pending,
            gateway_order_id: None,
            gateway_payment_id: None,
        };
        let lines = order_lines_from_quote(&quote);

        match self.insert_with_token_retries(&new_order, &lines).await {
            Ok(order) => {
                info!(token = %order.token, total = %order.total, "Direct order placed");
                self.finish_order(&order, &lines).await;
                Ok(order)
            }
            Err(e) => {
                // Nothing was paid; roll everything back and let the
                // customer retry.
                self.rollback_commit(&quote, consumed_coupon).await;
                Err(persist_error(e))
            }
        }
    }

    /// Consume one use of a coupon by code. `Ok(None)` means the coupon
    /// row vanished since the quote; the discount stands but there is
    /// nothing to count. `Err` carries the incident detail.
    async fn consume_coupon(&self, code: &str) -> Result<Option<CouponId>, String> {
        match self.store.find_by_code(code).await {
            Ok(Some(coupon)) => match self.store.try_increment_usage(coupon.id).await {
                Ok(true) => Ok(Some(coupon.id)),
                Ok(false) => Err(format!(
                    "coupon {code} usage limit reached after payment capture"
                )),
                Err(e) => Err(format!("coupon {code} usage increment failed: {e}")),
            },
            Ok(None) => {
                warn!(code, "Coupon vanished between quote and commit; usage not counted");
                Ok(None)
            }
            Err(e) => Err(format!("coupon {code} lookup failed: {e}")),
        }
    }

    /// Insert the order, drawing fresh tokens while the token collides.
    async fn insert_with_token_retries(
        &self,
        order: &NewOrder,
        lines: &[NewOrderLine],
    ) -> Result<Order, OrderInsertError> {
        for attempt in 0..TOKEN_INSERT_ATTEMPTS {
            match self
                .store
                .insert_order(&generate_order_token(), order, lines)
                .await
            {
                Err(OrderInsertError::TokenCollision) => {
                    warn!(attempt, "Order token collision, drawing a new token");
                }
                other => return other,
            }
        }
        Err(OrderInsertError::TokenCollision)
    }

    /// Undo a stock reservation and, if taken, a coupon use.
    async fn rollback_commit(&self, quote: &Quote, consumed_coupon: Option<CouponId>) {
        stock::release_lines(&self.store, &quote.lines).await;
        if let Some(id) = consumed_coupon {
            if let Err(e) = self.store.release_usage(id).await {
                error!(error = %e, coupon_id = %id, "Failed to release coupon usage");
                sentry::capture_error(&e);
            }
        }
    }

    /// Post-commit housekeeping: clear the cart and send the
    /// confirmation email. Neither can fail the order.
    async fn finish_order(&self, order: &Order, lines: &[NewOrderLine]) {
        if let Err(e) = self.store.clear_cart(order.owner_id).await {
            warn!(error = %e, token = %order.token, "Failed to clear cart after order");
        }

        let Some(mailer) = self.mailer.clone() else {
            return;
        };
        let Some(email) = order.customer_email.clone() else {
            return;
        };
        let order = order.clone();
        let lines = lines.to_vec();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_order_confirmation(&email, &order, &lines).await {
                warn!(error = %e, token = %order.token, "Failed to send order confirmation email");
            }
        });
    }

    /// Record a captured-but-uncommitted payment and alert the team.
    async fn open_incident(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: Option<&str>,
        owner: OwnerId,
        amount_minor: i64,
        reason: IncidentReason,
        detail: &str,
    ) {
        error!(
            gateway_order_id,
            reason = %reason,
            detail,
            "Opening payment incident"
        );

        let incident = NewIncident {
            gateway_order_id: gateway_order_id.to_string(),
            gateway_payment_id: gateway_payment_id.map(String::from),
            owner_id: owner,
            amount_minor,
            reason,
            detail: detail.to_string(),
        };

        match self.store.insert_incident(&incident).await {
            Ok(stored) => {
                if let Some(alerts) = &self.alerts {
                    let text = format!(
                        "Payment incident #{}: {} for gateway order `{}` ({} minor units). {}",
                        stored.id, reason, gateway_order_id, amount_minor, detail
                    );
                    if let Err(e) = alerts.post_text(&text).await {
                        warn!(error = %e, "Failed to post incident alert to Slack");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to record payment incident");
                sentry::capture_error(&e);
            }
        }
    }
}

fn order_lines_from_quote(quote: &Quote) -> Vec<NewOrderLine> {
    quote
        .lines
        .iter()
        .map(|line| NewOrderLine {
            item: line.item,
            display_name: line.display_name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total: line.line_total,
        })
        .collect()
}

fn persist_error(e: OrderInsertError) -> CheckoutError {
    match e {
        OrderInsertError::Other(re) => CheckoutError::Store(re),
        other => CheckoutError::Store(RepositoryError::Conflict(other.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_token_format() {
        for _ in 0..100 {
            let token = generate_order_token();
            assert_eq!(token.len(), 11);
            assert!(token.starts_with("MG-"));
            let suffix = token.strip_prefix("MG-").unwrap();
            assert!(suffix.bytes().all(|b| TOKEN_CHARSET.contains(&b)));
            // Lookalike characters are excluded from the alphabet.
            assert!(!suffix.contains(['0', 'O', '1', 'I']));
        }
    }

    #[test]
    fn test_gateway_timeout_maps_to_payment_timeout() {
        let err: CheckoutError = GatewayError::Timeout.into();
        assert!(matches!(err, CheckoutError::PaymentTimeout));

        let err: CheckoutError = GatewayError::Parse("bad json".to_string()).into();
        assert!(matches!(err, CheckoutError::Gateway(_)));
    }
}
