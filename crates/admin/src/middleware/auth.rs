//! Bearer token authentication for the admin API.
//!
//! The console is guarded by one static operator token loaded at
//! startup (`ADMIN_API_TOKEN`). The comparison is constant time so the
//! token cannot be probed byte by byte.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use secrecy::ExposeSecret;

use crate::error::AppError;
use crate::state::AppState;

/// Extractor that requires a valid `Authorization: Bearer` token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     _auth: RequireApiToken,
///     State(state): State<AppState>,
/// ) -> Result<Json<...>> {
///     ...
/// }
/// ```
pub struct RequireApiToken;

impl FromRequestParts<AppState> for RequireApiToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        if !constant_time_compare(presented, state.config().api_token.expose_secret()) {
            tracing::warn!("Rejected request with invalid admin API token");
            return Err(AppError::Unauthorized("invalid API token".to_string()));
        }

        Ok(Self)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    use crate::config::AdminConfig;

    const TEST_TOKEN: &str = "fR8v2Kq9mX4pL7wZ3jN6bT1cY5hD0gS8";

    fn test_state() -> AppState {
        let config = AdminConfig {
            database_url: SecretString::from("postgres://localhost/marram"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            api_token: SecretString::from(TEST_TOKEN),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };
        // Lazy pool: never actually connects in these tests.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/marram")
            .unwrap();
        AppState::new(config, pool)
    }

    async fn extract(auth_header: Option<&str>) -> Result<RequireApiToken, AppError> {
        let mut builder = Request::builder().uri("/api/orders");
        if let Some(value) = auth_header {
            builder = builder.header("authorization", value);
        }
        let request = builder.body(()).unwrap();
        let (mut parts, ()) = request.into_parts();
        RequireApiToken::from_request_parts(&mut parts, &test_state()).await
    }

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
        assert!(!constant_time_compare("hello", "helloo"));
    }

    #[tokio::test]
    async fn test_valid_token_accepted() {
        let result = extract(Some(&format!("Bearer {TEST_TOKEN}"))).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let result = extract(None).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_wrong_token_rejected() {
        let result = extract(Some("Bearer nope-not-the-token")).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_rejected() {
        let result = extract(Some(&format!("Basic {TEST_TOKEN}"))).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
