//! Display formatting
//!
//! Amounts are shown in the Turkish locale: currency symbol first, `.` between thousands
//! and `,` before the two decimal places. This is the only place amounts get rounded.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{Money, iso::Currency};

use crate::{
    currencies::symbol,
    discounts::{DiscountSpec, percent_points},
};

/// Number of decimal places shown for amounts.
pub const DISPLAY_DECIMALS: u32 = 2;

/// Format money for display, e.g. `₺1.234,50`.
pub fn format_currency(amount: &Money<'_, Currency>) -> String {
    format_amount(*amount.amount(), amount.currency())
}

/// Format a bare amount in a currency, e.g. `$12,00`.
pub fn format_amount(amount: Decimal, currency: &Currency) -> String {
    let mut rounded =
        amount.round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero);

    rounded.rescale(DISPLAY_DECIMALS);

    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    let digits = rounded.abs().to_string();
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    format!(
        "{sign}{}{},{fraction}",
        symbol(currency),
        group_thousands(whole)
    )
}

/// Format a percentage in the Turkish style, e.g. `%10` or `%12,5`.
pub fn format_percent(percent: Percentage) -> String {
    let points = percent_points(percent)
        .round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
        .normalize();

    format!("%{}", points.to_string().replace('.', ","))
}

/// Format a discount for a price list column: `%10`, `₺500,00`, or `-` when there is none.
pub fn format_discount(discount: &DiscountSpec<'_>) -> String {
    match discount {
        DiscountSpec::None => "-".to_string(),
        DiscountSpec::Percentage(percent) => format_percent(*percent),
        DiscountSpec::Amount(amount) => format_currency(amount),
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.chars().count();
    let mut grouped = String::with_capacity(len + len / 3);

    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            grouped.push('.');
        }

        grouped.push(ch);
    }

    grouped
}
