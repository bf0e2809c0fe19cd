//! Coupon storage.
//!
//! Validation itself lives on [`Coupon`] in the core crate; this module
//! only loads rows and performs the usage-count writes. The increment is
//! a compare-and-set so that the usage limit holds under concurrent
//! checkouts.

use chrono::{DateTime, Utc};
use marram_goods_core::{Coupon, CouponId};
use rust_decimal::Decimal;

use super::{PgStore, RepositoryError};

/// Coupon storage: lookup plus the usage-count compare-and-set.
#[allow(async_fn_in_trait)]
pub trait CouponStore: Send + Sync {
    /// Look up a coupon by its code. Codes are stored normalized
    /// (trimmed, uppercase); callers normalize with
    /// [`Coupon::normalize_code`] before querying.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError>;

    /// Atomically consume one use of a coupon. Succeeds only while the
    /// coupon is active and under its usage limit; returns `false` when
    /// another checkout took the last use first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn try_increment_usage(&self, id: CouponId) -> Result<bool, RepositoryError>;

    /// Return one previously consumed use, clamped at zero. Compensation
    /// for a checkout that incremented and then failed to persist its
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn release_usage(&self, id: CouponId) -> Result<(), RepositoryError>;
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: i32,
    code: String,
    discount_percent: i32,
    min_order_amount: Decimal,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    usage_limit: Option<i32>,
    usage_count: i32,
    is_active: bool,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Self {
            id: CouponId::new(row.id),
            code: row.code,
            discount_percent: row.discount_percent,
            min_order_amount: row.min_order_amount,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            usage_limit: row.usage_limit,
            usage_count: row.usage_count,
            is_active: row.is_active,
        }
    }
}

// =============================================================================
// PgStore implementation
// =============================================================================

impl CouponStore for PgStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(
            r"
            SELECT id, code, discount_percent, min_order_amount,
                   valid_from, valid_to, usage_limit, usage_count, is_active
            FROM coupons
            WHERE code = $1
            ",
        )
        .bind(code)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn try_increment_usage(&self, id: CouponId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE coupons
            SET usage_count = usage_count + 1, updated_at = now()
            WHERE id = $1
              AND is_active
              AND (usage_limit IS NULL OR usage_count < usage_limit)
            ",
        )
        .bind(id.as_i32())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_usage(&self, id: CouponId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE coupons
            SET usage_count = GREATEST(usage_count - 1, 0), updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
