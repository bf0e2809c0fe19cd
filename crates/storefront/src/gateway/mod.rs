//! Hosted payment gateway integration.
//!
//! The storefront registers an order with the gateway before the customer
//! pays, then verifies the browser-delivered callback against both the
//! shared-secret signature ([`signature`]) and the gateway's own record of
//! the payment ([`PaymentGateway::fetch_payment`]). Amounts cross the wire
//! in minor units.

pub mod client;
pub mod signature;

pub use client::HttpGateway;

use thiserror::Error;

/// Errors from talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway did not answer within the configured deadline. The
    /// payment state is unknown; callers must fail closed, never assume
    /// success.
    #[error("payment gateway timed out")]
    Timeout,

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The gateway answered with an error response.
    #[error("gateway API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The gateway's response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}

/// An order registered with the gateway ahead of payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    /// Gateway-issued order id, later echoed in the payment callback.
    pub id: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// One payment as the gateway itself reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPayment {
    pub id: String,
    /// The gateway order this payment was made against.
    pub order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    /// Whether the gateway has actually captured the money.
    pub captured: bool,
}

/// What the checkout pipeline needs from a payment gateway.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Send + Sync {
    /// Register an order for the given amount and get back the gateway's
    /// order id. `receipt` is an opaque merchant reference.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Timeout`] if the gateway does not answer in
    /// time, [`GatewayError::Api`] for error responses.
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError>;

    /// Fetch the authoritative state of one payment. This is the
    /// server-to-server check the callback path relies on; the browser's
    /// claim alone is never trusted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Timeout`] if the gateway does not answer in
    /// time, [`GatewayError::Api`] for error responses.
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}
