//! Payment intent storage.
//!
//! An intent pins the server-computed quote to a gateway order id at the
//! moment checkout starts. The callback path re-reads the pinned quote
//! instead of the live cart, so repricing between intent and payment
//! cannot change what the customer is charged. Consuming an intent is a
//! compare-and-set from `created` to `consumed`; whichever concurrent
//! confirmation wins the CAS is the one that materializes the order.

use chrono::{DateTime, Utc};
use marram_goods_core::{Email, IntentStatus, OwnerId, PaymentIntentId};
use uuid::Uuid;

use super::{PgStore, RepositoryError};
use crate::models::intent::PaymentIntent;
use crate::models::quote::Quote;

/// Intent storage: insert, lookup by gateway order id, single-use consume.
#[allow(async_fn_in_trait)]
pub trait IntentStore: Send + Sync {
    /// Record a new intent in `created` status with its pinned quote.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the gateway order id is
    /// already recorded.
    /// Returns `RepositoryError::Database` if the query fails.
    async fn insert_intent(
        &self,
        gateway_order_id: &str,
        owner: OwnerId,
        customer_email: Option<&Email>,
        amount_minor: i64,
        currency: &str,
        quote: &Quote,
    ) -> Result<PaymentIntent, RepositoryError>;

    /// Look up an intent by the gateway's order id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored quote or
    /// status is invalid.
    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<PaymentIntent>, RepositoryError>;

    /// Flip an intent from `created` to `consumed`. Returns `false` when
    /// the intent was already consumed (or never existed), which is how
    /// concurrent confirmations of the same payment lose the race.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn try_consume_intent(&self, gateway_order_id: &str) -> Result<bool, RepositoryError>;
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PaymentIntentRow {
    id: i32,
    gateway_order_id: String,
    owner_id: Uuid,
    customer_email: Option<String>,
    amount_minor: i64,
    currency: String,
    status: String,
    quote: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentIntentRow> for PaymentIntent {
    type Error = RepositoryError;

    fn try_from(row: PaymentIntentRow) -> Result<Self, Self::Error> {
        let customer_email = row
            .customer_email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;
        let status: IntentStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid intent status in database: {e}"))
        })?;
        let quote: Quote = serde_json::from_value(row.quote).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid quote snapshot in database: {e}"))
        })?;

        Ok(Self {
            id: PaymentIntentId::new(row.id),
            gateway_order_id: row.gateway_order_id,
            owner_id: OwnerId::from(row.owner_id),
            customer_email,
            amount_minor: row.amount_minor,
            currency: row.currency,
            status,
            quote,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// PgStore implementation
// =============================================================================

impl IntentStore for PgStore {
    async fn insert_intent(
        &self,
        gateway_order_id: &str,
        owner: OwnerId,
        customer_email: Option<&Email>,
        amount_minor: i64,
        currency: &str,
        quote: &Quote,
    ) -> Result<PaymentIntent, RepositoryError> {
        let quote_json = serde_json::to_value(quote).map_err(|e| {
            RepositoryError::DataCorruption(format!("failed to serialize quote snapshot: {e}"))
        })?;

        let row = sqlx::query_as::<_, PaymentIntentRow>(
            r"
            INSERT INTO payment_intents (
                gateway_order_id, owner_id, customer_email, amount_minor, currency, quote
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, gateway_order_id, owner_id, customer_email, amount_minor,
                      currency, status, quote, created_at
            ",
        )
        .bind(gateway_order_id)
        .bind(owner.as_uuid())
        .bind(customer_email.map(Email::as_str))
        .bind(amount_minor)
        .bind(currency)
        .bind(quote_json)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("payment_intents_gateway_order_id_key")
            {
                return RepositoryError::Conflict(format!(
                    "payment intent for gateway order {gateway_order_id} already exists"
                ));
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<PaymentIntent>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentIntentRow>(
            r"
            SELECT id, gateway_order_id, owner_id, customer_email, amount_minor,
                   currency, status, quote, created_at
            FROM payment_intents
            WHERE gateway_order_id = $1
            ",
        )
        .bind(gateway_order_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn try_consume_intent(&self, gateway_order_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE payment_intents
            SET status = 'consumed'
            WHERE gateway_order_id = $1 AND status = 'created'
            ",
        )
        .bind(gateway_order_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
