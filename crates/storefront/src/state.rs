//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::PgStore;
use crate::gateway::{GatewayError, HttpGateway};
use crate::services::checkout::CheckoutService;
use crate::services::display_cache::DisplayCache;
use crate::services::email::EmailService;
use crate::slack::SlackClient;

/// Error assembling application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("SMTP relay: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store and the checkout pipeline.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: PgStore,
    checkout: CheckoutService<PgStore, HttpGateway>,
    display_cache: DisplayCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Email and Slack are optional collaborators; when their config
    /// blocks are absent the checkout pipeline runs without them.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway HTTP client or the SMTP relay
    /// cannot be configured.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let store = PgStore::new(pool);
        let gateway = HttpGateway::new(&config.gateway)?;

        let mut checkout = CheckoutService::new(
            store.clone(),
            gateway,
            config.pricing.clone(),
            config.gateway.webhook_secret.clone(),
        );
        if let Some(smtp) = &config.smtp {
            checkout = checkout.with_mailer(EmailService::new(smtp)?);
        }
        if let Some(slack) = &config.slack {
            checkout = checkout.with_alerts(SlackClient::new(slack));
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                checkout,
                display_cache: DisplayCache::new(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.inner.store.pool()
    }

    /// Get a reference to the backing store.
    #[must_use]
    pub fn store(&self) -> &PgStore {
        &self.inner.store
    }

    /// Get a reference to the checkout pipeline.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService<PgStore, HttpGateway> {
        &self.inner.checkout
    }

    /// Get a reference to the catalog display cache.
    #[must_use]
    pub fn display_cache(&self) -> &DisplayCache {
        &self.inner.display_cache
    }
}
