//! HTTP client for the hosted payment gateway.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{GatewayError, GatewayOrder, GatewayPayment, PaymentGateway};
use crate::config::PaymentGatewayConfig;

/// Gateway client authenticating with basic auth over the key pair.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Create a client from gateway configuration. Every request carries
    /// the configured timeout; an expired deadline surfaces as
    /// [`GatewayError::Timeout`].
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentGatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| GatewayError::Parse(format!("failed to parse response: {e}")));
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: String,
    order_id: String,
    amount: i64,
    currency: String,
    status: String,
}

impl PaymentGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let body = CreateOrderRequest {
            amount: amount_minor,
            currency,
            receipt,
        };

        let response = self
            .client
            .post(format!("{}/v1/orders", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let order: OrderResponse = Self::handle_response(response).await?;
        debug!(gateway_order_id = %order.id, "Gateway order created");

        Ok(GatewayOrder {
            id: order.id,
            amount_minor: order.amount,
            currency: order.currency,
        })
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let response = self
            .client
            .get(format!("{}/v1/payments/{payment_id}", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await?;

        let payment: PaymentResponse = Self::handle_response(response).await?;
        debug!(status = %payment.status, "Gateway payment fetched");

        Ok(GatewayPayment {
            id: payment.id,
            order_id: payment.order_id,
            amount_minor: payment.amount,
            currency: payment.currency,
            captured: payment.status == "captured",
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_key_secret() {
        let gateway = HttpGateway::new(&PaymentGatewayConfig {
            api_base: "https://gateway.test/".to_string(),
            key_id: "key_live_123".to_string(),
            key_secret: SecretString::from("supersecret"),
            webhook_secret: SecretString::from("whsecret-whsecret-whsecret-12345"),
            timeout_secs: 10,
        })
        .unwrap();

        let debug = format!("{gateway:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("[REDACTED]"));
        // Trailing slash is normalized away.
        assert!(debug.contains("https://gateway.test"));
    }
}
