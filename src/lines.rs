//! Priced lines
//!
//! A line is one plan, product or contract module on a quote: a unit price, a quantity and
//! an optional discount. The discount applies once to the line total, so a percentage scales
//! with the quantity while a fixed amount is taken off the whole line.
//!
//! A fixed-amount discount in another currency than the line does not apply: the line is
//! priced undiscounted and a warning is logged, so one mismatched line never blocks the
//! totals of a quote.

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::warn;

use crate::discounts::{AppliedDiscount, DiscountError, DiscountSpec, apply_discount};

/// Errors raised while pricing a line.
#[derive(Debug, Error, PartialEq)]
pub enum LineError {
    /// Quantities start at one.
    #[error("line quantity must be at least 1")]
    ZeroQuantity,

    /// Unit price times quantity overflowed.
    #[error("line total overflowed")]
    Overflow,

    /// Error applying the line discount.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// A single quote line.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine<'a> {
    name: String,
    base_price: Money<'a, Currency>,
    discount: DiscountSpec<'a>,
    quantity: u32,
}

impl<'a> PricedLine<'a> {
    /// Create an undiscounted line.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::ZeroQuantity`] when `quantity` is zero.
    pub fn new(
        name: impl Into<String>,
        base_price: Money<'a, Currency>,
        quantity: u32,
    ) -> Result<Self, LineError> {
        if quantity == 0 {
            return Err(LineError::ZeroQuantity);
        }

        Ok(Self {
            name: name.into(),
            base_price,
            discount: DiscountSpec::None,
            quantity,
        })
    }

    /// Attach a discount.
    #[must_use]
    pub fn with_discount(mut self, discount: DiscountSpec<'a>) -> Self {
        self.discount = discount;
        self
    }

    /// Replace the discount.
    pub fn set_discount(&mut self, discount: DiscountSpec<'a>) {
        self.discount = discount;
    }

    /// Replace the quantity.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::ZeroQuantity`] when `quantity` is zero.
    pub fn set_quantity(&mut self, quantity: u32) -> Result<(), LineError> {
        if quantity == 0 {
            return Err(LineError::ZeroQuantity);
        }

        self.quantity = quantity;

        Ok(())
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit price
    pub fn base_price(&self) -> &Money<'a, Currency> {
        &self.base_price
    }

    /// Line discount
    pub fn discount(&self) -> &DiscountSpec<'a> {
        &self.discount
    }

    /// Quantity
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Currency the line is priced in
    pub fn currency(&self) -> &'a Currency {
        self.base_price.currency()
    }

    /// Unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::Overflow`] if the product does not fit a decimal.
    pub fn total_before_discount(&self) -> Result<Money<'a, Currency>, LineError> {
        let total = self
            .base_price
            .amount()
            .checked_mul(Decimal::from(self.quantity))
            .ok_or(LineError::Overflow)?;

        Ok(Money::from_decimal(total, self.currency()))
    }

    /// Whether the discount can be taken off this line.
    ///
    /// Only a fixed amount in a different currency cannot.
    pub fn discount_applies(&self) -> bool {
        match self.discount {
            DiscountSpec::Amount(amount) => amount.currency() == self.currency(),
            DiscountSpec::None | DiscountSpec::Percentage(_) => true,
        }
    }

    /// Price the line.
    ///
    /// A discount that does not apply (see [`PricedLine::discount_applies`]) is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the total or the discount arithmetic overflows.
    pub fn price(&self) -> Result<LinePricing<'a>, LineError> {
        let total_before_discount = self.total_before_discount()?;

        let discount = if self.discount_applies() {
            self.discount
        } else {
            warn!(
                line = %self.name,
                currency = self.currency().iso_alpha_code,
                "fixed discount is in another currency; line priced undiscounted"
            );

            DiscountSpec::None
        };

        let AppliedDiscount {
            discount_amount,
            final_amount,
        } = apply_discount(&total_before_discount, &discount)?;

        Ok(LinePricing {
            total_before_discount,
            discount_amount,
            final_amount,
        })
    }
}

/// Derived amounts for a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePricing<'a> {
    /// Unit price times quantity
    pub total_before_discount: Money<'a, Currency>,

    /// Amount the line discount takes off
    pub discount_amount: Money<'a, Currency>,

    /// Total after the line discount, never negative
    pub final_amount: Money<'a, Currency>,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use rusty_money::iso::{TRY, USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn zero_quantity_is_rejected() {
        let line = PricedLine::new("Muhasebe", Money::from_decimal(dec!(100), TRY), 0);

        assert_eq!(line, Err(LineError::ZeroQuantity));
    }

    #[test]
    fn set_quantity_rejects_zero_and_keeps_previous() -> TestResult {
        let mut line = PricedLine::new("Muhasebe", Money::from_decimal(dec!(100), TRY), 3)?;

        assert_eq!(line.set_quantity(0), Err(LineError::ZeroQuantity));
        assert_eq!(line.quantity(), 3);

        Ok(())
    }

    #[test]
    fn percentage_discount_applies_to_the_line_total() -> TestResult {
        let line = PricedLine::new("Bordro", Money::from_decimal(dec!(300), TRY), 2)?
            .with_discount(DiscountSpec::percentage_points(dec!(10))?);

        let pricing = line.price()?;

        assert_eq!(pricing.total_before_discount, Money::from_decimal(dec!(600), TRY));
        assert_eq!(pricing.discount_amount, Money::from_decimal(dec!(60), TRY));
        assert_eq!(pricing.final_amount, Money::from_decimal(dec!(540), TRY));

        Ok(())
    }

    #[test]
    fn amount_discount_is_taken_off_the_line_once() -> TestResult {
        let line = PricedLine::new("Destek", Money::from_decimal(dec!(40), USD), 3)?
            .with_discount(DiscountSpec::amount(Money::from_decimal(dec!(25), USD))?);

        assert_eq!(
            line.price()?.final_amount,
            Money::from_decimal(dec!(95), USD)
        );

        Ok(())
    }

    #[test]
    fn cross_currency_amount_discount_is_skipped() -> TestResult {
        let mut line = PricedLine::new("Destek", Money::from_decimal(dec!(40), USD), 1)?;

        line.set_discount(DiscountSpec::Amount(Money::from_decimal(dec!(5), TRY)));

        let pricing = line.price()?;

        assert!(!line.discount_applies());
        assert_eq!(pricing.discount_amount, Money::from_decimal(dec!(0), USD));
        assert_eq!(pricing.final_amount, Money::from_decimal(dec!(40), USD));

        Ok(())
    }

    #[test]
    fn overflowing_total_is_an_error() -> TestResult {
        let line = PricedLine::new("Destek", Money::from_decimal(Decimal::MAX, USD), 2)?;

        assert_eq!(line.price(), Err(LineError::Overflow));

        Ok(())
    }
}
