//! Unified error handling for the admin console.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::{RepositoryError, ResolveError, TransitionError};

/// Application-level error type for the admin API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Fulfillment transition refused.
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// Incident resolution refused.
    #[error("{0}")]
    Resolve(#[from] ResolveError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body every error response carries.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transition(e) => match e {
                TransitionError::NotFound => StatusCode::NOT_FOUND,
                TransitionError::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                TransitionError::Conflict => StatusCode::CONFLICT,
                TransitionError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Resolve(e) => match e {
                ResolveError::NotFound => StatusCode::NOT_FOUND,
                ResolveError::AlreadyResolved => StatusCode::CONFLICT,
                ResolveError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Internal(_) => "internal",
            Self::Transition(e) => match e {
                TransitionError::NotFound => "not_found",
                TransitionError::Invalid { .. } => "invalid_transition",
                TransitionError::Conflict => "conflict",
                TransitionError::Repository(_) => "internal",
            },
            Self::Resolve(e) => match e {
                ResolveError::NotFound => "not_found",
                ResolveError::AlreadyResolved => "already_resolved",
                ResolveError::Repository(_) => "internal",
            },
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
        }
    }

    /// Server-side faults are captured to Sentry; client errors are not.
    const fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Transition(TransitionError::Repository(_))
                | Self::Resolve(ResolveError::Repository(_))
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = if self.is_server_fault() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: self.code(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Convenience alias used by route handlers.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use marram_goods_core::FulfillmentStatus;

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
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
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
    fn test_transition_error_status_codes() {
        assert_eq!(
            get_status(AppError::Transition(TransitionError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Transition(TransitionError::Invalid {
                from: FulfillmentStatus::Delivered,
                next: FulfillmentStatus::Pending,
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Transition(TransitionError::Conflict)),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_resolve_error_status_codes() {
        assert_eq!(
            get_status(AppError::Resolve(ResolveError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Resolve(ResolveError::AlreadyResolved)),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_invalid_transition_message_names_both_states() {
        let err = AppError::Transition(TransitionError::Invalid {
            from: FulfillmentStatus::Delivered,
            next: FulfillmentStatus::Pending,
        });
        let text = err.to_string();
        assert!(text.contains("delivered"));
        assert!(text.contains("pending"));
    }
}
