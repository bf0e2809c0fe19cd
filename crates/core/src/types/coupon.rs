//! Coupon validation and discount math.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::id::CouponId;
use crate::types::price::round_to_cents;

/// A percentage-off coupon with a validity window and usage ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Uppercase code as stored. Lookups normalize first.
    pub code: String,
    /// Whole-number percent in `0..=100`.
    pub discount_percent: i32,
    /// Minimum subtotal the coupon applies to.
    pub min_order_amount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    /// `None` means unlimited redemptions.
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub is_active: bool,
}

/// Why a coupon could not be applied.
///
/// Each failing condition maps to its own variant so the storefront can
/// render a precise message instead of a generic "invalid coupon".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("coupon code not found")]
    NotFound,

    #[error("coupon is not active")]
    Inactive,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon is not valid yet")]
    NotYetActive,

    #[error("order subtotal is below the coupon minimum of {minimum}")]
    BelowMinimum { minimum: Decimal },

    #[error("coupon usage limit reached")]
    UsageExceeded,
}

impl Coupon {
    /// Normalize a user-entered code for lookup. Codes are stored
    /// uppercase and matched case-insensitively.
    #[must_use]
    pub fn normalize_code(raw: &str) -> String {
        raw.trim().to_uppercase()
    }

    /// Whether the usage counter is still below the limit.
    #[must_use]
    pub fn has_remaining_uses(&self) -> bool {
        self.usage_limit.is_none_or(|limit| self.usage_count < limit)
    }

    /// Check every condition in order and return the discount amount.
    ///
    /// The first failing check wins: active, then validity window, then
    /// minimum subtotal, then usage ceiling. Validation never mutates the
    /// usage counter; that happens only when an order commits.
    pub fn validate(&self, now: DateTime<Utc>, subtotal: Decimal) -> Result<Decimal, CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive);
        }
        if now > self.valid_to {
            return Err(CouponError::Expired);
        }
        if now < self.valid_from {
            return Err(CouponError::NotYetActive);
        }
        if subtotal < self.min_order_amount {
            return Err(CouponError::BelowMinimum {
                minimum: self.min_order_amount,
            });
        }
        if !self.has_remaining_uses() {
            return Err(CouponError::UsageExceeded);
        }
        Ok(self.discount_amount(subtotal))
    }

    /// `subtotal * percent / 100`, rounded to cents, capped at the
    /// subtotal so a discount can never push the total negative.
    #[must_use]
    pub fn discount_amount(&self, subtotal: Decimal) -> Decimal {
        let raw = subtotal * Decimal::from(self.discount_percent) / Decimal::from(100);
        round_to_cents(raw).min(subtotal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn coupon() -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: "SAVE10".to_string(),
            discount_percent: 10,
            min_order_amount: Decimal::new(100, 0),
            valid_from: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("date"),
            valid_to: Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).single().expect("date"),
            usage_limit: Some(5),
            usage_count: 0,
            is_active: true,
        }
    }

    fn mid_window() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).single().expect("date")
    }

    #[test]
    fn test_valid_coupon_computes_discount() {
        let discount = coupon()
            .validate(mid_window(), Decimal::new(200, 0))
            .expect("valid");
        assert_eq!(discount, Decimal::new(2000, 2));
    }

    #[test]
    fn test_inactive_checked_first() {
        // Inactive and expired at once: inactive must win.
        let mut c = coupon();
        c.is_active = false;
        let after = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).single().expect("date");
        assert_eq!(
            c.validate(after, Decimal::new(200, 0)),
            Err(CouponError::Inactive)
        );
    }

    #[test]
    fn test_expired() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("date");
        assert_eq!(
            coupon().validate(after, Decimal::new(200, 0)),
            Err(CouponError::Expired)
        );
    }

    #[test]
    fn test_not_yet_active() {
        let before = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().expect("date");
        assert_eq!(
            coupon().validate(before, Decimal::new(200, 0)),
            Err(CouponError::NotYetActive)
        );
    }

    #[test]
    fn test_below_minimum_boundary() {
        // Exactly the minimum passes; one cent under fails.
        assert!(coupon().validate(mid_window(), Decimal::new(100, 0)).is_ok());
        assert_eq!(
            coupon().validate(mid_window(), Decimal::new(9999, 2)),
            Err(CouponError::BelowMinimum {
                minimum: Decimal::new(100, 0)
            })
        );
    }

    #[test]
    fn test_usage_ceiling() {
        let mut c = coupon();
        c.usage_count = 4;
        assert!(c.validate(mid_window(), Decimal::new(200, 0)).is_ok());

        c.usage_count = 5;
        assert_eq!(
            c.validate(mid_window(), Decimal::new(200, 0)),
            Err(CouponError::UsageExceeded)
        );
    }

    #[test]
    fn test_unlimited_usage() {
        let mut c = coupon();
        c.usage_limit = None;
        c.usage_count = 1_000_000;
        assert!(c.has_remaining_uses());
        assert!(c.validate(mid_window(), Decimal::new(200, 0)).is_ok());
    }

    #[test]
    fn test_discount_rounds_half_up() {
        // 10% of 100.05 = 10.005 -> 10.01.
        let discount = coupon().discount_amount(Decimal::new(10_005, 2));
        assert_eq!(discount, Decimal::new(1001, 2));
    }

    #[test]
    fn test_discount_capped_at_subtotal() {
        let mut c = coupon();
        c.discount_percent = 100;
        let subtotal = Decimal::new(4999, 2);
        assert_eq!(c.discount_amount(subtotal), subtotal);
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(Coupon::normalize_code("  save10 "), "SAVE10");
        assert_eq!(Coupon::normalize_code("SAVE10"), "SAVE10");
    }
}
