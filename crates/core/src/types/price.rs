//! Type-safe money representation using decimal arithmetic.
//!
//! All amounts are `rust_decimal::Decimal` in the currency's standard
//! unit (dollars, not cents). Binary floats never touch money.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round an amount to two decimal places, half-up.
///
/// Every derived amount (discounts, tax, totals) passes through this
/// before it is persisted or sent to the gateway.
#[must_use]
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A monetary amount with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// The amount rounded to two decimal places.
    #[must_use]
    pub fn rounded(&self) -> Decimal {
        round_to_cents(self.amount)
    }

    /// The amount in minor units (cents), as the gateway wire format
    /// requires. `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn minor_units(&self) -> Option<i64> {
        (self.rounded() * Decimal::from(100)).round().to_i64()
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency_code.symbol(), self.rounded())
    }
}

/// ISO 4217 currency codes.
///
/// All supported currencies use two decimal places, so the minor-unit
/// factor is uniformly 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// The currency symbol for display.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "\u{20ac}",
            Self::GBP => "\u{a3}",
        }
    }

    /// The three-letter code as the gateway expects it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(format!("invalid currency code: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_to_cents(Decimal::new(2345, 3)), Decimal::new(235, 2));
        assert_eq!(round_to_cents(Decimal::new(2344, 3)), Decimal::new(234, 2));
        assert_eq!(round_to_cents(Decimal::new(180, 0)), Decimal::new(180, 0));
    }

    #[test]
    fn test_minor_units() {
        let price = Price::new(Decimal::new(18000, 2), CurrencyCode::USD);
        assert_eq!(price.minor_units(), Some(18_000));

        let fractional = Price::new(Decimal::new(9995, 2), CurrencyCode::USD);
        assert_eq!(fractional.minor_units(), Some(9_995));
    }

    #[test]
    fn test_minor_units_rounds_first() {
        // 10.005 rounds to 10.01 before conversion.
        let price = Price::new(Decimal::new(10_005, 3), CurrencyCode::USD);
        assert_eq!(price.minor_units(), Some(1_001));
    }

    #[test]
    fn test_display() {
        let price = Price::new(Decimal::new(1999, 2), CurrencyCode::USD);
        assert_eq!(price.display(), "$19.99");
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("USD".parse::<CurrencyCode>(), Ok(CurrencyCode::USD));
        assert!("usd".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::GBP.as_str(), "GBP");
    }
}
