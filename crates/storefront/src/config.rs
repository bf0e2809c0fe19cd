//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `PAYMENT_GATEWAY_URL` - Base URL of the hosted payment gateway API
//! - `PAYMENT_GATEWAY_KEY_ID` - Gateway API key id (basic auth user)
//! - `PAYMENT_GATEWAY_KEY_SECRET` - Gateway API key secret (basic auth password)
//! - `PAYMENT_GATEWAY_WEBHOOK_SECRET` - HMAC secret for callback signatures
//!   (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `PAYMENT_GATEWAY_TIMEOUT_SECS` - Per-request gateway timeout (default: 10)
//! - `STORE_CURRENCY` - ISO 4217 code for all prices (default: USD)
//! - `SHIPPING_FEE` - Flat shipping fee (default: 0)
//! - `FREE_SHIPPING_THRESHOLD` - Subtotal at which shipping is waived (default: 0)
//! - `TAX_PERCENT` - Tax as a percentage of the discounted subtotal (default: 0)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`,
//!   `SMTP_FROM_ADDRESS`, `SMTP_FROM_NAME` - Order confirmation email relay;
//!   email is disabled when `SMTP_HOST` is unset
//! - `SLACK_BOT_TOKEN`, `SLACK_ALERTS_CHANNEL` - Payment incident alerts;
//!   disabled unless both are set
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag (default: development)
//! - `SENTRY_SAMPLE_RATE` - Sentry event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Sentry tracing sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use marram_goods_core::CurrencyCode;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_WEBHOOK_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront (used in email links)
    pub base_url: String,
    /// Hosted payment gateway configuration
    pub gateway: PaymentGatewayConfig,
    /// Shipping, tax, and currency settings
    pub pricing: PricingConfig,
    /// Order confirmation email relay; `None` disables email
    pub smtp: Option<SmtpConfig>,
    /// Payment incident alerting; `None` disables Slack alerts
    pub slack: Option<SlackConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
    /// Sentry error event sample rate
    pub sentry_sample_rate: f32,
    /// Sentry performance tracing sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Hosted payment gateway credentials and endpoints.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PaymentGatewayConfig {
    /// Base URL of the gateway REST API
    pub api_base: String,
    /// API key id, sent as the basic auth username
    pub key_id: String,
    /// API key secret, sent as the basic auth password
    pub key_secret: SecretString,
    /// Shared secret for HMAC-SHA256 callback signatures
    pub webhook_secret: SecretString,
    /// Per-request timeout in seconds; expiry fails the payment closed
    pub timeout_secs: u64,
}

impl std::fmt::Debug for PaymentGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGatewayConfig")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Currency and quote pricing knobs.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Single configured currency for the whole store
    pub currency: CurrencyCode,
    /// Flat shipping fee added to every order below the threshold
    pub shipping_fee: Decimal,
    /// Subtotal (after discount) at which shipping becomes free
    pub free_shipping_threshold: Decimal,
    /// Tax percentage applied to the discounted subtotal
    pub tax_percent: Decimal,
}

impl Default for PricingConfig {
    /// Shipping and tax default to zero; both are opt-in via env.
    fn default() -> Self {
        Self {
            currency: CurrencyCode::USD,
            shipping_fee: Decimal::ZERO,
            free_shipping_threshold: Decimal::ZERO,
            tax_percent: Decimal::ZERO,
        }
    }
}

/// SMTP relay settings for transactional email.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub from_name: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .finish()
    }
}

/// Slack alerting settings for payment incidents.
///
/// Implements `Debug` manually to redact the bot token.
#[derive(Clone)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub alerts_channel: String,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("alerts_channel", &self.alerts_channel)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;

        let gateway = PaymentGatewayConfig::from_env()?;
        let pricing = PricingConfig::from_env()?;
        let smtp = SmtpConfig::from_env()?;
        let slack = SlackConfig::from_env();

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_f32_or_default("SENTRY_SAMPLE_RATE", 1.0)?;
        let sentry_traces_sample_rate = get_f32_or_default("SENTRY_TRACES_SAMPLE_RATE", 0.1)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            gateway,
            pricing,
            smtp,
            slack,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl PaymentGatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = get_validated_secret("PAYMENT_GATEWAY_WEBHOOK_SECRET")?;
        validate_secret_length(
            &webhook_secret,
            "PAYMENT_GATEWAY_WEBHOOK_SECRET",
            MIN_WEBHOOK_SECRET_LENGTH,
        )?;

        Ok(Self {
            api_base: get_required_env("PAYMENT_GATEWAY_URL")?,
            key_id: get_required_env("PAYMENT_GATEWAY_KEY_ID")?,
            key_secret: get_validated_secret("PAYMENT_GATEWAY_KEY_SECRET")?,
            webhook_secret,
            timeout_secs: get_env_or_default("PAYMENT_GATEWAY_TIMEOUT_SECS", "10")
                .parse::<u64>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "PAYMENT_GATEWAY_TIMEOUT_SECS".to_string(),
                        e.to_string(),
                    )
                })?,
        })
    }
}

impl PricingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("STORE_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("STORE_CURRENCY".to_string(), e))?;

        Ok(Self {
            currency,
            shipping_fee: get_nonnegative_decimal("SHIPPING_FEE", "0")?,
            free_shipping_threshold: get_nonnegative_decimal("FREE_SHIPPING_THRESHOLD", "0")?,
            tax_percent: get_nonnegative_decimal("TAX_PERCENT", "0")?,
        })
    }
}

impl SmtpConfig {
    /// Email is opt-in: absence of `SMTP_HOST` disables it entirely, but a
    /// partially configured relay is an error rather than silent no-mail.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            host,
            port: get_env_or_default("SMTP_PORT", "587").parse::<u16>().map_err(|e| {
                ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string())
            })?,
            username: get_required_env("SMTP_USERNAME")?,
            password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM_ADDRESS")?,
            from_name: get_env_or_default("SMTP_FROM_NAME", "Marram Goods"),
        }))
    }
}

impl SlackConfig {
    fn from_env() -> Option<Self> {
        let bot_token = get_optional_env("SLACK_BOT_TOKEN")?;
        let alerts_channel = get_optional_env("SLACK_ALERTS_CHANNEL")?;
        Some(Self {
            bot_token: SecretString::from(bot_token),
            alerts_channel,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., STOREFRONT_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL (set by Fly.io postgres attach)
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable as an `f32` with a default.
fn get_f32_or_default(key: &str, default: f32) -> Result<f32, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<f32>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Parse an environment variable as a non-negative decimal with a default.
fn get_nonnegative_decimal(key: &str, default: &str) -> Result<Decimal, ConfigError> {
    let raw = get_env_or_default(key, default);
    let value = raw
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if value < Decimal::ZERO {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must not be negative (got {value})"),
        ));
    }
    Ok(value)
}

/// Validate that a secret meets a minimum length requirement.
fn validate_secret_length(
    secret: &SecretString,
    var_name: &str,
    min_length: usize,
) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < min_length {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {min_length} characters (got {})",
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_high() {
        // Random-looking string should have high entropy
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_changeme() {
        let result = validate_secret_strength("changeme123", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length_too_short() {
        let secret = SecretString::from("short");
        let result = validate_secret_length(&secret, "TEST_WEBHOOK", MIN_WEBHOOK_SECRET_LENGTH);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_length_valid() {
        let secret = SecretString::from("a".repeat(32));
        let result = validate_secret_length(&secret, "TEST_WEBHOOK", MIN_WEBHOOK_SECRET_LENGTH);
        assert!(result.is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            gateway: PaymentGatewayConfig {
                api_base: "https://gateway.test".to_string(),
                key_id: "key_id_value".to_string(),
                key_secret: SecretString::from("key_secret_value"),
                webhook_secret: SecretString::from("w".repeat(32)),
                timeout_secs: 10,
            },
            pricing: PricingConfig::default(),
            smtp: None,
            slack: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_gateway_config_debug_redacts_secrets() {
        let config = PaymentGatewayConfig {
            api_base: "https://gateway.test".to_string(),
            key_id: "key_id_value".to_string(),
            key_secret: SecretString::from("super_secret_key_value"),
            webhook_secret: SecretString::from("super_secret_webhook_value"),
            timeout_secs: 10,
        };

        let debug_output = format!("{config:?}");

        // Public fields should be visible
        assert!(debug_output.contains("https://gateway.test"));
        assert!(debug_output.contains("key_id_value"));

        // Secret fields should be redacted
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_key_value"));
        assert!(!debug_output.contains("super_secret_webhook_value"));
    }

    #[test]
    fn test_smtp_config_debug_redacts_password() {
        let config = SmtpConfig {
            host: "smtp.test".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: SecretString::from("smtp_password_value"),
            from_address: "orders@marramgoods.com".to_string(),
            from_name: "Marram Goods".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("smtp_password_value"));
    }

    #[test]
    fn test_pricing_defaults() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.currency, CurrencyCode::USD);
        assert_eq!(pricing.shipping_fee, Decimal::ZERO);
        assert_eq!(pricing.free_shipping_threshold, Decimal::ZERO);
        assert_eq!(pricing.tax_percent, Decimal::ZERO);
    }
}
