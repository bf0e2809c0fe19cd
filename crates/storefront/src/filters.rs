//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Formats a monetary amount with two decimal places.
///
/// Usage in templates: `{{ order.total|money }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn money(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format!("{value:.2}"))
}

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    #[test]
    fn test_money_pads_to_two_places() {
        assert_eq!(format!("{:.2}", Decimal::new(180, 0)), "180.00");
        assert_eq!(format!("{:.2}", Decimal::new(195, 1)), "19.50");
        assert_eq!(format!("{:.2}", Decimal::new(5, 2)), "0.05");
    }
}
