//! Contract Fixtures

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;

use crate::{
    currencies::parse_currency,
    discounts::{DiscountSpec, from_points},
    fixtures::FixtureError,
    lines::PricedLine,
};

/// A contract quote in YAML
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractFixture {
    /// Contract title
    #[serde(default)]
    pub title: Option<String>,

    /// Settlement currency code
    #[serde(default = "default_settlement")]
    pub settlement: String,

    /// Settlement units per unit of each currency; omitted while rates are still loading
    #[serde(default)]
    pub rates: Option<FxHashMap<String, Decimal>>,

    /// Reason the rates failed to load
    #[serde(default)]
    pub rates_error: Option<String>,

    /// General discount (e.g. "20%")
    #[serde(default)]
    pub general_discount: Option<String>,

    /// Quote lines in display order
    pub lines: Vec<LineFixture>,
}

/// Line Fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineFixture {
    /// Plan, product or module name
    pub name: String,

    /// Unit price (e.g. "500 TRY")
    pub price: String,

    /// Quantity, defaulting to one
    #[serde(default = "default_quantity")]
    pub quantity: u32,

    /// Line discount
    #[serde(default)]
    pub discount: Option<DiscountFixture>,
}

/// Discount configuration
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountFixture {
    /// Percentage off (e.g. "10%")
    Percentage {
        /// Percentage string
        value: String,
    },

    /// Fixed amount off (e.g. "50 TRY")
    Amount {
        /// Price string
        value: String,
    },
}

fn default_settlement() -> String {
    "TRY".to_string()
}

fn default_quantity() -> u32 {
    1
}

impl TryFrom<&DiscountFixture> for DiscountSpec<'static> {
    type Error = FixtureError;

    fn try_from(fixture: &DiscountFixture) -> Result<Self, Self::Error> {
        let spec = match fixture {
            DiscountFixture::Percentage { value } => {
                DiscountSpec::Percentage(parse_percentage(value)?)
            }
            DiscountFixture::Amount { value } => DiscountSpec::Amount(parse_price(value)?),
        };

        spec.validate()?;

        Ok(spec)
    }
}

impl TryFrom<LineFixture> for PricedLine<'static> {
    type Error = FixtureError;

    fn try_from(fixture: LineFixture) -> Result<Self, Self::Error> {
        let price = parse_price(&fixture.price)?;

        let discount = fixture
            .discount
            .as_ref()
            .map(DiscountSpec::try_from)
            .transpose()?
            .unwrap_or_default();

        let line = PricedLine::new(fixture.name.clone(), price, fixture.quantity).map_err(
            |source| FixtureError::InvalidLine {
                name: fixture.name,
                source,
            },
        )?;

        Ok(line.with_discount(discount))
    }
}

/// Parse a price string (e.g. "2.99 USD") into money
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY", if the amount is
/// not a decimal, or if the currency is not supported.
pub fn parse_price(s: &str) -> Result<Money<'static, Currency>, FixtureError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    let [amount, code] = parts.as_slice() else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    let currency =
        parse_currency(code).map_err(|_err| FixtureError::UnknownCurrency((*code).to_string()))?;

    Ok(Money::from_decimal(amount, currency))
}

/// Parse a percentage string into a `Percentage`
///
/// Accepts "15%" and "%15" (Turkish order) for 15%, or a bare fraction such as "0.15".
///
/// # Errors
///
/// Returns an error if the number cannot be parsed.
pub fn parse_percentage(s: &str) -> Result<Percentage, FixtureError> {
    let trimmed = s.trim();

    let points = trimmed
        .strip_suffix('%')
        .or_else(|| trimmed.strip_prefix('%'));

    let parse = |value: &str| {
        value
            .trim()
            .replace(',', ".")
            .parse::<Decimal>()
            .map_err(|_err| FixtureError::InvalidPercentage(s.to_string()))
    };

    match points {
        Some(points) => Ok(from_points(parse(points)?)),
        None => Ok(Percentage::from(parse(trimmed)?)),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use rusty_money::iso::{EUR, TRY, USD};
    use testresult::TestResult;

    use super::*;
    use crate::{
        discounts::{DiscountError, percent_points},
        lines::LineError,
    };

    #[test]
    fn parse_price_rejects_invalid_format() {
        let result = parse_price("500TRY");

        assert!(matches!(result, Err(FixtureError::InvalidPrice(_))));
    }

    #[test]
    fn parse_price_rejects_unsupported_currency() {
        let result = parse_price("2.99 GBP");

        assert!(matches!(result, Err(FixtureError::UnknownCurrency(code)) if code == "GBP"));
    }

    #[test]
    fn parse_price_accepts_supported_currencies() -> TestResult {
        assert_eq!(parse_price("500 TL")?, Money::from_decimal(dec!(500), TRY));
        assert_eq!(parse_price("12.50 USD")?, Money::from_decimal(dec!(12.5), USD));
        assert_eq!(parse_price("1 EUR")?, Money::from_decimal(dec!(1), EUR));

        Ok(())
    }

    #[test]
    fn parse_percentage_accepts_each_format() -> TestResult {
        assert_eq!(percent_points(parse_percentage("15%")?), dec!(15));
        assert_eq!(percent_points(parse_percentage("%12,5")?), dec!(12.5));
        assert_eq!(percent_points(parse_percentage("0.15")?), dec!(15));

        Ok(())
    }

    #[test]
    fn parse_percentage_rejects_garbage() {
        let result = parse_percentage("ten%");

        assert!(matches!(result, Err(FixtureError::InvalidPercentage(_))));
    }

    #[test]
    fn line_fixture_builds_a_discounted_line() -> TestResult {
        let fixture: LineFixture = serde_norway::from_str(
            "name: Muhasebe\nprice: 500 TRY\ndiscount:\n  type: percentage\n  value: 10%\n",
        )?;

        let line = PricedLine::try_from(fixture)?;

        assert_eq!(line.quantity(), 1);
        assert_eq!(line.price()?.final_amount, Money::from_decimal(dec!(450), TRY));

        Ok(())
    }

    #[test]
    fn out_of_range_discounts_are_rejected() -> TestResult {
        let fixture: LineFixture = serde_norway::from_str(
            "name: Muhasebe\nprice: 500 TRY\ndiscount:\n  type: percentage\n  value: 150%\n",
        )?;

        let result = PricedLine::try_from(fixture);

        assert!(matches!(
            result,
            Err(FixtureError::Discount(DiscountError::PercentOutOfRange(_)))
        ));

        Ok(())
    }

    #[test]
    fn zero_quantity_names_the_line() -> TestResult {
        let fixture: LineFixture =
            serde_norway::from_str("name: Bordro\nprice: 300 TRY\nquantity: 0\n")?;

        let result = PricedLine::try_from(fixture);

        assert!(matches!(
            result,
            Err(FixtureError::InvalidLine { name, source: LineError::ZeroQuantity }) if name == "Bordro"
        ));

        Ok(())
    }
}
