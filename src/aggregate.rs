//! Aggregate totals
//!
//! Lines are grouped by currency and each group is summed on its own; currencies are never
//! mixed inside a group. A general discount then takes the same percentage off every
//! group, and the groups are converted and summed into one settlement-currency total.
//!
//! Everything is recomputed from the lines on each call.

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, MoneyError, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use crate::{
    discounts::clamped_fraction,
    exchange::{Conversion, ConversionQuality, ExchangeError, ExchangeTable},
    lines::{LineError, PricedLine},
    solver::{SolveError, solve_general_discount_for_target},
};

/// Errors raised while aggregating lines.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// A line could not be priced.
    #[error("line {index} ({name}): {source}")]
    Line {
        /// Position of the line in the input
        index: usize,

        /// Line name
        name: String,

        /// The underlying line error
        source: LineError,
    },

    /// No group is priced in the requested currency.
    #[error("no lines are priced in {0}")]
    MissingGroup(&'static str),

    /// General discount arithmetic overflowed.
    #[error("general discount overflowed")]
    Overflow,

    /// Conversion into the settlement currency failed.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Inverse solve failed.
    #[error(transparent)]
    Solve(#[from] SolveError),

    /// Money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Totals for the lines priced in one currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrencyGroup<'a> {
    /// Currency of every amount in the group
    pub currency: &'a Currency,

    /// Sum of line totals before line discounts
    pub subtotal: Money<'a, Currency>,

    /// Sum of line totals after line discounts
    pub discounted: Money<'a, Currency>,

    /// `discounted` after the general discount
    pub total: Money<'a, Currency>,

    /// Number of lines in the group
    pub lines: usize,
}

/// Grouped totals plus the settlement-currency grand total.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTotal<'a> {
    groups: SmallVec<[CurrencyGroup<'a>; 3]>,
    general_discount: Option<Percentage>,
    grand_total: Money<'a, Currency>,
    quality: ConversionQuality,
}

impl<'a> AggregateTotal<'a> {
    /// Groups in the order their currency first appeared.
    pub fn groups(&self) -> &[CurrencyGroup<'a>] {
        &self.groups
    }

    /// Group priced in `currency`, if any.
    pub fn group(&self, currency: &Currency) -> Option<&CurrencyGroup<'a>> {
        self.groups.iter().find(|group| group.currency == currency)
    }

    /// General discount applied on top of the line discounts.
    pub fn general_discount(&self) -> Option<Percentage> {
        self.general_discount
    }

    /// Sum of all groups in the settlement currency.
    pub fn grand_total(&self) -> Money<'a, Currency> {
        self.grand_total
    }

    /// Whether every conversion used a real rate.
    pub fn quality(&self) -> ConversionQuality {
        self.quality
    }

    /// Whether the grand total includes a conversion made without a rate.
    pub fn is_degraded(&self) -> bool {
        self.quality == ConversionQuality::Degraded
    }

    /// Whether there are no lines.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Grand total expressed in another currency.
    ///
    /// # Errors
    ///
    /// See [`ExchangeTable::from_settlement`].
    pub fn grand_total_in(
        &self,
        target: &'a Currency,
        rates: &ExchangeTable,
    ) -> Result<Conversion<'a>, ExchangeError> {
        rates.from_settlement(&self.grand_total, target)
    }

    /// Derive the general discount that makes the group in `target`'s currency total `target`.
    ///
    /// Solves against the group's total after line discounts and before any general
    /// discount. Returns `Ok(None)` when that total is not positive.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::MissingGroup`] if no lines are priced in that currency.
    pub fn solve_for_target(
        &self,
        target: &Money<'_, Currency>,
    ) -> Result<Option<Percentage>, AggregateError> {
        let group = self
            .group(target.currency())
            .ok_or(AggregateError::MissingGroup(target.currency().iso_alpha_code))?;

        Ok(solve_general_discount_for_target(&group.discounted, target)?)
    }
}

/// Group lines by currency and total them.
///
/// # Errors
///
/// Returns an error if:
/// - a line total overflows (`AggregateError::Line`). A fixed discount in another currency
///   than its line is skipped, not reported.
/// - a group cannot be converted into the settlement currency (`AggregateError::Exchange`).
pub fn aggregate<'a>(
    lines: &[PricedLine<'a>],
    rates: &ExchangeTable,
) -> Result<AggregateTotal<'a>, AggregateError> {
    let mut groups: SmallVec<[CurrencyGroup<'a>; 3]> = SmallVec::new();

    for (index, line) in lines.iter().enumerate() {
        let pricing = line.price().map_err(|source| AggregateError::Line {
            index,
            name: line.name().to_string(),
            source,
        })?;

        let currency = line.currency();

        if let Some(group) = groups.iter_mut().find(|group| group.currency == currency) {
            group.subtotal = group.subtotal.add(pricing.total_before_discount)?;
            group.discounted = group.discounted.add(pricing.final_amount)?;
            group.total = group.discounted;
            group.lines += 1;
        } else {
            groups.push(CurrencyGroup {
                currency,
                subtotal: pricing.total_before_discount,
                discounted: pricing.final_amount,
                total: pricing.final_amount,
                lines: 1,
            });
        }
    }

    settle(groups, None, rates)
}

/// Take `percent` off every group's line-discounted total.
///
/// Always starts from the totals after line discounts, so applying a new general discount
/// replaces the previous one instead of stacking on it.
///
/// # Errors
///
/// Returns an error if the reduction overflows or a group cannot be converted.
pub fn apply_general_discount<'a>(
    aggregate: &AggregateTotal<'a>,
    percent: Percentage,
    rates: &ExchangeTable,
) -> Result<AggregateTotal<'a>, AggregateError> {
    let fraction = clamped_fraction(percent);
    let mut groups = aggregate.groups.clone();

    for group in &mut groups {
        let discounted = *group.discounted.amount();

        let reduction = discounted
            .checked_mul(fraction)
            .ok_or(AggregateError::Overflow)?;

        let total = discounted
            .checked_sub(reduction)
            .ok_or(AggregateError::Overflow)?
            .max(Decimal::ZERO);

        group.total = Money::from_decimal(total, group.currency);
    }

    settle(groups, Some(Percentage::from(fraction)), rates)
}

fn settle<'a>(
    groups: SmallVec<[CurrencyGroup<'a>; 3]>,
    general_discount: Option<Percentage>,
    rates: &ExchangeTable,
) -> Result<AggregateTotal<'a>, AggregateError> {
    let mut grand_total = Decimal::ZERO;
    let mut quality = ConversionQuality::Exact;

    for group in &groups {
        let conversion = rates.to_settlement(&group.total)?;

        grand_total = grand_total
            .checked_add(*conversion.money.amount())
            .ok_or(AggregateError::Overflow)?;

        quality = quality.combine(conversion.quality);
    }

    debug!(
        groups = groups.len(),
        %grand_total,
        degraded = quality == ConversionQuality::Degraded,
        "aggregate settled"
    );

    Ok(AggregateTotal {
        groups,
        general_discount,
        grand_total: Money::from_decimal(grand_total, rates.settlement()),
        quality,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use rusty_money::iso::{EUR, TRY, USD};
    use testresult::TestResult;

    use super::*;
    use crate::discounts::{DiscountSpec, from_points, percent_points};

    fn rates() -> Result<ExchangeTable, ExchangeError> {
        ExchangeTable::ready(TRY, [(USD, dec!(32.50)), (EUR, dec!(35.00))])
    }

    fn contract_lines() -> Result<Vec<PricedLine<'static>>, LineError> {
        Ok(vec![
            PricedLine::new("Muhasebe", Money::from_decimal(dec!(500), TRY), 1)?
                .with_discount(DiscountSpec::percentage_points(dec!(10))?),
            PricedLine::new("Bordro", Money::from_decimal(dec!(300), TRY), 2)?,
            PricedLine::new("Bulut Yedekleme", Money::from_decimal(dec!(100), USD), 1)?,
        ])
    }

    #[test]
    fn groups_lines_by_currency() -> TestResult {
        let total = aggregate(&contract_lines()?, &rates()?)?;

        let lira = total.group(TRY).ok_or("missing TRY group")?;
        let dollars = total.group(USD).ok_or("missing USD group")?;

        assert_eq!(lira.subtotal, Money::from_decimal(dec!(1100), TRY));
        assert_eq!(lira.discounted, Money::from_decimal(dec!(1050), TRY));
        assert_eq!(lira.lines, 2);
        assert_eq!(dollars.discounted, Money::from_decimal(dec!(100), USD));
        assert_eq!(dollars.lines, 1);
        assert!(total.group(EUR).is_none());

        Ok(())
    }

    #[test]
    fn groups_keep_first_appearance_order() -> TestResult {
        let total = aggregate(&contract_lines()?, &rates()?)?;

        let order: Vec<&str> = total
            .groups()
            .iter()
            .map(|group| group.currency.iso_alpha_code)
            .collect();

        assert_eq!(order, ["TRY", "USD"]);

        Ok(())
    }

    #[test]
    fn grand_total_converts_foreign_groups() -> TestResult {
        let total = aggregate(&contract_lines()?, &rates()?)?;

        assert_eq!(total.grand_total(), Money::from_decimal(dec!(4300), TRY));
        assert!(!total.is_degraded());
        assert_eq!(total.general_discount(), None);

        Ok(())
    }

    #[test]
    fn general_discount_reduces_every_group() -> TestResult {
        let rates = rates()?;
        let total = aggregate(&contract_lines()?, &rates)?;
        let discounted = apply_general_discount(&total, from_points(dec!(20)), &rates)?;

        let lira = discounted.group(TRY).ok_or("missing TRY group")?;
        let dollars = discounted.group(USD).ok_or("missing USD group")?;

        assert_eq!(lira.total, Money::from_decimal(dec!(840), TRY));
        assert_eq!(dollars.total, Money::from_decimal(dec!(80), USD));
        assert_eq!(discounted.grand_total(), Money::from_decimal(dec!(3440), TRY));

        Ok(())
    }

    #[test]
    fn general_discount_replaces_rather_than_stacks() -> TestResult {
        let rates = rates()?;
        let total = aggregate(&contract_lines()?, &rates)?;
        let first = apply_general_discount(&total, from_points(dec!(20)), &rates)?;
        let second = apply_general_discount(&first, from_points(dec!(10)), &rates)?;

        let lira = second.group(TRY).ok_or("missing TRY group")?;

        assert_eq!(lira.total, Money::from_decimal(dec!(945), TRY));
        assert_eq!(second.general_discount().map(percent_points), Some(dec!(10)));

        Ok(())
    }

    #[test]
    fn empty_lines_total_zero_in_settlement_currency() -> TestResult {
        let total = aggregate(&[], &rates()?)?;

        assert!(total.is_empty());
        assert_eq!(total.grand_total(), Money::from_decimal(dec!(0), TRY));

        Ok(())
    }

    #[test]
    fn unavailable_rates_degrade_the_grand_total() -> TestResult {
        let total = aggregate(&contract_lines()?, &ExchangeTable::loading(TRY))?;

        assert_eq!(total.grand_total(), Money::from_decimal(dec!(1150), TRY));
        assert!(total.is_degraded());

        Ok(())
    }

    #[test]
    fn line_errors_name_the_line() -> TestResult {
        let lines = [PricedLine::new("Destek", Money::from_decimal(Decimal::MAX, USD), 2)?];

        let result = aggregate(&lines, &rates()?);

        assert!(matches!(
            result,
            Err(AggregateError::Line {
                index: 0,
                source: LineError::Overflow,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn cross_currency_amount_discount_leaves_groups_intact() -> TestResult {
        let mut lines = contract_lines()?;

        if let Some(line) = lines.last_mut() {
            line.set_discount(DiscountSpec::Amount(Money::from_decimal(dec!(50), TRY)));
        }

        let total = aggregate(&lines, &rates()?)?;

        let lira = total.group(TRY).ok_or("missing TRY group")?;
        let dollars = total.group(USD).ok_or("missing USD group")?;

        assert_eq!(lira.discounted, Money::from_decimal(dec!(1050), TRY));
        assert_eq!(dollars.discounted, Money::from_decimal(dec!(100), USD));
        assert_eq!(total.grand_total(), Money::from_decimal(dec!(4300), TRY));

        Ok(())
    }

    #[test]
    fn solve_for_target_uses_the_line_discounted_total() -> TestResult {
        let rates = rates()?;
        let total = aggregate(&contract_lines()?, &rates)?;
        let with_general = apply_general_discount(&total, from_points(dec!(50)), &rates)?;

        let percent = with_general
            .solve_for_target(&Money::from_decimal(dec!(840), TRY))?
            .ok_or("expected a solved rate")?;

        assert_eq!(percent_points(percent), dec!(20));

        Ok(())
    }

    #[test]
    fn solve_for_target_requires_a_matching_group() -> TestResult {
        let total = aggregate(&contract_lines()?, &rates()?)?;
        let result = total.solve_for_target(&Money::from_decimal(dec!(10), EUR));

        assert!(matches!(result, Err(AggregateError::MissingGroup("EUR"))));

        Ok(())
    }

    #[test]
    fn grand_total_in_other_currency() -> TestResult {
        let rates = rates()?;
        let total = aggregate(&contract_lines()?, &rates)?;
        let in_dollars = total.grand_total_in(USD, &rates)?;

        assert_eq!(in_dollars.money.amount().round_dp(2), dec!(132.31));

        Ok(())
    }
}
