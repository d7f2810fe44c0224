//! Discounts
//!
//! Plan, product, customer pricing and contract module screens all price through
//! [`apply_discount`], so the floor-at-zero rule lives in one place.
//!
//! Out-of-range input is rejected at the boundary by the [`DiscountSpec`] constructors.
//! [`apply_discount`] never rejects a discount for being out of range: it clamps it and logs
//! a warning instead, because it runs inline while a view is being rendered.

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::warn;

use crate::currencies::CurrencyError;

/// Errors specific to discount calculations.
#[derive(Debug, Error, PartialEq)]
pub enum DiscountError {
    /// A percentage discount outside 0–100 percent points.
    #[error("discount percentage {0} is outside 0..=100")]
    PercentOutOfRange(Decimal),

    /// A fixed-amount discount below zero.
    #[error("discount amount {0} is negative")]
    NegativeAmount(Decimal),

    /// A fixed-amount discount in a different currency than the price it applies to.
    #[error("discount is in {discount}, but the price is in {price}")]
    CurrencyMismatch {
        /// Currency of the discounted price
        price: &'static str,

        /// Currency of the discount amount
        discount: &'static str,
    },

    /// Decimal arithmetic overflowed.
    #[error("discount calculation overflowed")]
    Overflow,

    /// The discount names a currency outside the supported set.
    #[error(transparent)]
    Currency(#[from] CurrencyError),
}

/// How a price is discounted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DiscountSpec<'a> {
    /// No discount.
    #[default]
    None,

    /// Take a percentage off (e.g. "%10").
    Percentage(Percentage),

    /// Take a fixed amount off (e.g. "₺500"), never going below zero.
    Amount(Money<'a, Currency>),
}

impl<'a> DiscountSpec<'a> {
    /// Build a percentage discount from percent points (`10` for 10%).
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::PercentOutOfRange`] unless `0 <= points <= 100`.
    pub fn percentage_points(points: Decimal) -> Result<Self, DiscountError> {
        if points < Decimal::ZERO || points > Decimal::ONE_HUNDRED {
            return Err(DiscountError::PercentOutOfRange(points));
        }

        Ok(Self::Percentage(from_points(points)))
    }

    /// Build a fixed-amount discount.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::NegativeAmount`] if the amount is below zero.
    pub fn amount(value: Money<'a, Currency>) -> Result<Self, DiscountError> {
        if *value.amount() < Decimal::ZERO {
            return Err(DiscountError::NegativeAmount(*value.amount()));
        }

        Ok(Self::Amount(value))
    }

    /// Check that an already-built discount is within range.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::PercentOutOfRange`] or [`DiscountError::NegativeAmount`].
    pub fn validate(&self) -> Result<(), DiscountError> {
        match self {
            Self::None => Ok(()),
            Self::Percentage(percent) => {
                Self::percentage_points(percent_points(*percent)).map(|_spec| ())
            }
            Self::Amount(value) => Self::amount(*value).map(|_spec| ()),
        }
    }

    /// Whether this discount changes the price at all.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Outcome of discounting a single price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedDiscount<'a> {
    /// Amount taken off the base price
    pub discount_amount: Money<'a, Currency>,

    /// Base price minus the discount, never negative
    pub final_amount: Money<'a, Currency>,
}

/// Discount a price.
///
/// Amounts keep full decimal precision; round only when formatting for display.
///
/// # Errors
///
/// Returns an error if:
/// - a fixed-amount discount is in a different currency than `base`
///   (`DiscountError::CurrencyMismatch`); convert it first.
/// - decimal arithmetic overflows (`DiscountError::Overflow`).
pub fn apply_discount<'a>(
    base: &Money<'a, Currency>,
    discount: &DiscountSpec<'a>,
) -> Result<AppliedDiscount<'a>, DiscountError> {
    let currency = base.currency();
    let base_amount = floor_at_zero(*base.amount(), "base price");

    let discount_amount = match discount {
        DiscountSpec::None => Decimal::ZERO,
        DiscountSpec::Percentage(percent) => base_amount
            .checked_mul(clamped_fraction(*percent))
            .ok_or(DiscountError::Overflow)?,
        DiscountSpec::Amount(amount) => {
            if amount.currency() != currency {
                return Err(DiscountError::CurrencyMismatch {
                    price: currency.iso_alpha_code,
                    discount: amount.currency().iso_alpha_code,
                });
            }

            floor_at_zero(*amount.amount(), "discount amount").min(base_amount)
        }
    };

    let final_amount = base_amount
        .checked_sub(discount_amount)
        .ok_or(DiscountError::Overflow)?
        .max(Decimal::ZERO);

    Ok(AppliedDiscount {
        discount_amount: Money::from_decimal(discount_amount, currency),
        final_amount: Money::from_decimal(final_amount, currency),
    })
}

/// Build a percentage from percent points (`15` becomes 15%).
pub fn from_points(points: Decimal) -> Percentage {
    Percentage::from(points / Decimal::ONE_HUNDRED)
}

/// Percent points of a percentage (15% becomes `15`).
pub fn percent_points(percent: Percentage) -> Decimal {
    percent * Decimal::ONE_HUNDRED
}

/// Fraction of a percentage clamped into `0..=1`.
pub(crate) fn clamped_fraction(percent: Percentage) -> Decimal {
    let fraction = percent * Decimal::ONE;
    let clamped = fraction.clamp(Decimal::ZERO, Decimal::ONE);

    if clamped != fraction {
        warn!(
            percent = %percent_points(percent),
            "discount percentage clamped into 0..=100"
        );
    }

    clamped
}

fn floor_at_zero(value: Decimal, what: &'static str) -> Decimal {
    if value < Decimal::ZERO {
        warn!(%value, what, "negative value treated as zero");

        return Decimal::ZERO;
    }

    value
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use rusty_money::iso::{TRY, USD};
    use testresult::TestResult;

    use super::*;

    fn lira(amount: Decimal) -> Money<'static, Currency> {
        Money::from_decimal(amount, TRY)
    }

    #[test]
    fn no_discount_is_identity() -> TestResult {
        let applied = apply_discount(&lira(dec!(1250.75)), &DiscountSpec::None)?;

        assert_eq!(applied.discount_amount, lira(dec!(0)));
        assert_eq!(applied.final_amount, lira(dec!(1250.75)));

        Ok(())
    }

    #[test]
    fn percentage_discount_scales_the_base() -> TestResult {
        let discount = DiscountSpec::percentage_points(dec!(10))?;
        let applied = apply_discount(&lira(dec!(500)), &discount)?;

        assert_eq!(applied.discount_amount, lira(dec!(50)));
        assert_eq!(applied.final_amount, lira(dec!(450)));

        Ok(())
    }

    #[test]
    fn percentage_discount_keeps_full_precision() -> TestResult {
        let discount = DiscountSpec::percentage_points(dec!(12.5))?;
        let applied = apply_discount(&lira(dec!(99.99)), &discount)?;

        assert_eq!(applied.final_amount, lira(dec!(87.49125)));

        Ok(())
    }

    #[test]
    fn amount_discount_is_subtracted() -> TestResult {
        let discount = DiscountSpec::amount(lira(dec!(120)))?;
        let applied = apply_discount(&lira(dec!(500)), &discount)?;

        assert_eq!(applied.discount_amount, lira(dec!(120)));
        assert_eq!(applied.final_amount, lira(dec!(380)));

        Ok(())
    }

    #[test]
    fn amount_discount_larger_than_base_floors_at_zero() -> TestResult {
        let discount = DiscountSpec::amount(lira(dec!(750)))?;
        let applied = apply_discount(&lira(dec!(500)), &discount)?;

        assert_eq!(applied.discount_amount, lira(dec!(500)));
        assert_eq!(applied.final_amount, lira(dec!(0)));

        Ok(())
    }

    #[test]
    fn amount_discount_in_other_currency_is_rejected() {
        let discount = DiscountSpec::Amount(Money::from_decimal(dec!(10), USD));
        let result = apply_discount(&lira(dec!(500)), &discount);

        assert_eq!(
            result,
            Err(DiscountError::CurrencyMismatch {
                price: "TRY",
                discount: "USD",
            })
        );
    }

    #[test]
    fn out_of_range_percentages_are_clamped_when_applied() -> TestResult {
        let too_much = DiscountSpec::Percentage(Percentage::from(1.5));
        let negative = DiscountSpec::Percentage(Percentage::from(-0.25));

        assert_eq!(
            apply_discount(&lira(dec!(200)), &too_much)?.final_amount,
            lira(dec!(0))
        );
        assert_eq!(
            apply_discount(&lira(dec!(200)), &negative)?.final_amount,
            lira(dec!(200))
        );

        Ok(())
    }

    #[test]
    fn negative_amounts_are_clamped_when_applied() -> TestResult {
        let discount = DiscountSpec::Amount(lira(dec!(-40)));
        let applied = apply_discount(&lira(dec!(200)), &discount)?;

        assert_eq!(applied.final_amount, lira(dec!(200)));

        Ok(())
    }

    #[test]
    fn negative_base_is_treated_as_zero() -> TestResult {
        let discount = DiscountSpec::percentage_points(dec!(10))?;
        let applied = apply_discount(&lira(dec!(-10)), &discount)?;

        assert_eq!(applied.final_amount, lira(dec!(0)));

        Ok(())
    }

    #[test]
    fn constructors_reject_out_of_range_values() {
        assert_eq!(
            DiscountSpec::percentage_points(dec!(100.01)),
            Err(DiscountError::PercentOutOfRange(dec!(100.01)))
        );
        assert_eq!(
            DiscountSpec::percentage_points(dec!(-1)),
            Err(DiscountError::PercentOutOfRange(dec!(-1)))
        );
        assert_eq!(
            DiscountSpec::amount(lira(dec!(-0.01))),
            Err(DiscountError::NegativeAmount(dec!(-0.01)))
        );
    }

    #[test]
    fn validate_flags_hand_built_specs() -> TestResult {
        assert!(DiscountSpec::None.validate().is_ok());
        assert!(DiscountSpec::percentage_points(dec!(100))?.validate().is_ok());
        assert!(
            DiscountSpec::Percentage(Percentage::from(1.2))
                .validate()
                .is_err()
        );
        assert!(DiscountSpec::Amount(lira(dec!(-5))).validate().is_err());

        Ok(())
    }

    #[test]
    fn points_round_trip_through_percentage() {
        assert_eq!(percent_points(from_points(dec!(15))), dec!(15));
    }
}
