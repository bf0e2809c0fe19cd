//! Customer reference extractor.
//!
//! The storefront does not authenticate customers; an upstream auth layer
//! does, and forwards the customer's opaque UUID in the `x-customer-ref`
//! header. Every cart and order operation is scoped by that UUID.

use axum::{extract::FromRequestParts, http::request::Parts};
use marram_goods_core::OwnerId;

use crate::error::{AppError, set_sentry_customer};

/// The HTTP header carrying the customer reference.
pub const CUSTOMER_REF_HEADER: &str = "x-customer-ref";

/// Extractor for the customer reference on storefront API routes.
///
/// Rejects with `400 Bad Request` when the header is missing or is not a
/// UUID. On success the customer is attached to the Sentry scope so
/// errors correlate with who hit them.
///
/// # Example
///
/// ```rust,ignore
/// async fn get_cart(
///     CustomerRef(owner): CustomerRef,
///     State(state): State<AppState>,
/// ) -> Result<Json<CartView>> { /* ... */ }
/// ```
#[derive(Debug)]
pub struct CustomerRef(pub OwnerId);

impl<S> FromRequestParts<S> for CustomerRef
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CUSTOMER_REF_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                AppError::BadRequest(format!("missing {CUSTOMER_REF_HEADER} header"))
            })?;

        let owner: OwnerId = raw.parse().map_err(|_| {
            AppError::BadRequest(format!("{CUSTOMER_REF_HEADER} must be a UUID"))
        })?;

        set_sentry_customer(owner);
        Ok(Self(owner))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(header: Option<&str>) -> Result<CustomerRef, AppError> {
        let mut builder = Request::builder().uri("/api/cart");
        if let Some(value) = header {
            builder = builder.header(CUSTOMER_REF_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        CustomerRef::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_uuid_extracts() {
        let owner = extract(Some("5f0c3a84-1fce-4a4c-9d0b-7380ac8f3149"))
            .await
            .unwrap();
        assert_eq!(
            owner.0.to_string(),
            "5f0c3a84-1fce-4a4c-9d0b-7380ac8f3149"
        );
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let err = extract(None).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_malformed_uuid_rejected() {
        let err = extract(Some("not-a-uuid")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
