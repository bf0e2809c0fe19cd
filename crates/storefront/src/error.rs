//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Responses are JSON with a stable machine-readable `error` code so the
//! storefront client can branch without parsing messages.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use marram_goods_core::{CouponError, ItemRef, OwnerId};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::checkout::CheckoutError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Checkout pipeline failure, from cart validation through payment.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error payload.
///
/// `available` and `item` are present only for out-of-stock rejections so
/// the client can offer a reduced quantity.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    item: Option<ItemRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<i32>,
}

impl AppError {
    /// Whether this error indicates a server-side fault worth capturing.
    const fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Checkout(
                    CheckoutError::Store(_)
                        | CheckoutError::Gateway(_)
                        | CheckoutError::PaidButUncommitted { .. }
                )
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Checkout(err) => match err {
                CheckoutError::Validation(_)
                | CheckoutError::EmptyCart
                | CheckoutError::PaymentForged => StatusCode::BAD_REQUEST,
                CheckoutError::OutOfStock { .. } | CheckoutError::DuplicateSubmission => {
                    StatusCode::CONFLICT
                }
                CheckoutError::Coupon(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::PaymentTimeout => StatusCode::GATEWAY_TIMEOUT,
                CheckoutError::Gateway(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::PaidButUncommitted { .. } | CheckoutError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, message, item, available) = match self {
            Self::Database(_) | Self::Internal(_) | Self::Checkout(CheckoutError::Store(_)) => (
                "internal_error",
                "Internal server error".to_string(),
                None,
                None,
            ),
            Self::Checkout(err) => match err {
                CheckoutError::Validation(msg) => ("validation", msg.clone(), None, None),
                CheckoutError::EmptyCart => {
                    ("empty_cart", "Your cart is empty".to_string(), None, None)
                }
                CheckoutError::OutOfStock { item, available } => (
                    "out_of_stock",
                    format!("Only {available} left in stock"),
                    Some(*item),
                    Some(*available),
                ),
                CheckoutError::Coupon(coupon_err) => {
                    let code = match coupon_err {
                        CouponError::NotFound => "coupon_not_found",
                        CouponError::Inactive => "coupon_inactive",
                        CouponError::Expired => "coupon_expired",
                        CouponError::NotYetActive => "coupon_not_yet_active",
                        CouponError::BelowMinimum { .. } => "coupon_below_minimum",
                        CouponError::UsageExceeded => "coupon_usage_exceeded",
                    };
                    (code, coupon_err.to_string(), None, None)
                }
                CheckoutError::PaymentForged => (
                    "payment_forged",
                    "Payment verification failed".to_string(),
                    None,
                    None,
                ),
                CheckoutError::PaymentTimeout => (
                    "payment_timeout",
                    "Payment verification timed out, please try again".to_string(),
                    None,
                    None,
                ),
                CheckoutError::DuplicateSubmission => (
                    "duplicate_submission",
                    "This payment is already being processed".to_string(),
                    None,
                    None,
                ),
                CheckoutError::PaidButUncommitted { .. } => (
                    "paid_but_uncommitted",
                    "Your payment was received but the order could not be completed. \
                     Our team has been notified and will resolve it shortly. \
                     Do not pay again."
                        .to_string(),
                    None,
                    None,
                ),
                CheckoutError::Gateway(_) => (
                    "gateway_error",
                    "Payment gateway unavailable".to_string(),
                    None,
                    None,
                ),
                CheckoutError::Store(_) => {
                    ("internal_error", "Internal server error".to_string(), None, None)
                }
            },
            Self::NotFound(msg) => ("not_found", msg.clone(), None, None),
            Self::BadRequest(msg) => ("bad_request", msg.clone(), None, None),
        };

        ErrorBody {
            error,
            message,
            item,
            available,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from the customer reference.
///
/// Called by the customer-ref extractor so errors correlate with the
/// customer that hit them.
pub fn set_sentry_customer(owner: OwnerId) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(owner.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for checkout pipeline steps.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use marram_goods_core::ProductId;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order MG-XXXXXXXX".to_string());
        assert_eq!(err.to_string(), "Not found: order MG-XXXXXXXX");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_error_status_codes() {
        assert_eq!(
            get_status(CheckoutError::PaymentForged.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::PaymentTimeout.into()),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            get_status(CheckoutError::DuplicateSubmission.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::Coupon(CouponError::Expired).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(
                CheckoutError::OutOfStock {
                    item: ItemRef::Simple(ProductId::new(1)),
                    available: 0,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(
                CheckoutError::PaidButUncommitted {
                    detail: "stock commit failed".to_string(),
                }
                .into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_out_of_stock_body_carries_availability() {
        let err = AppError::from(CheckoutError::OutOfStock {
            item: ItemRef::Simple(ProductId::new(7)),
            available: 3,
        });
        let body = err.body();
        assert_eq!(body.error, "out_of_stock");
        assert_eq!(body.available, Some(3));
        assert_eq!(body.item, Some(ItemRef::Simple(ProductId::new(7))));
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = AppError::Internal("connection pool exhausted".to_string());
        let body = err.body();
        assert_eq!(body.message, "Internal server error");
        assert!(!body.message.contains("pool"));
    }
}
