//! Fixtures

use std::{fs, path::PathBuf};

use decimal_percentage::Percentage;
use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{
    config::PricingConfig,
    currencies::{parse_currency, settlement},
    discounts::{DiscountError, DiscountSpec},
    exchange::{ExchangeError, ExchangeTable, RateProvider},
    fixtures::contracts::{ContractFixture, parse_percentage},
    lines::{LineError, PricedLine},
    session::{PricingSession, SessionError},
};

pub mod contracts;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// A line could not be built
    #[error("Invalid line {name}: {source}")]
    InvalidLine {
        /// Line name
        name: String,

        /// Why the line was rejected
        source: LineError,
    },

    /// Discount out of range
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Rates could not be built
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Session could not be started
    #[error(transparent)]
    Session(#[from] SessionError),

    /// No contract loaded yet
    #[error("No contract loaded")]
    NoContract,
}

/// A contract quote loaded from YAML
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    title: Option<String>,
    lines: Vec<PricedLine<'static>>,
    rates: Option<ExchangeTable>,
    general_discount: Option<Percentage>,
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            title: None,
            lines: Vec::new(),
            rates: None,
            general_discount: None,
        }
    }

    /// Load a contract from `contracts/{name}.yml`, replacing anything loaded before
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a price, discount or rate
    /// is invalid.
    pub fn load_contract(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("contracts").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: ContractFixture = serde_norway::from_str(&contents)?;

        let settlement = parse_currency(&fixture.settlement)
            .map_err(|_err| FixtureError::UnknownCurrency(fixture.settlement.clone()))?;

        let rates = match (fixture.rates, fixture.rates_error) {
            (_, Some(reason)) => ExchangeTable::failed(settlement, reason),
            (Some(rates), None) => ExchangeTable::from_codes(settlement, rates)?,
            (None, None) => ExchangeTable::loading(settlement),
        };

        let general_discount = fixture
            .general_discount
            .as_deref()
            .map(parse_percentage)
            .transpose()?;

        if let Some(percent) = general_discount {
            DiscountSpec::Percentage(percent).validate()?;
        }

        self.lines = fixture
            .lines
            .into_iter()
            .map(PricedLine::try_from)
            .collect::<Result<_, _>>()?;

        self.title = fixture.title;
        self.rates = Some(rates);
        self.general_discount = general_discount;

        Ok(self)
    }

    /// Load a contract from the default fixtures directory
    ///
    /// # Errors
    ///
    /// Returns an error if the contract cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture.load_contract(name)?;

        Ok(fixture)
    }

    /// Contract title
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Get all lines
    pub fn lines(&self) -> &[PricedLine<'static>] {
        &self.lines
    }

    /// Get the exchange rates, or a loading table in the default settlement currency
    pub fn rates(&self) -> ExchangeTable {
        self.rates
            .clone()
            .unwrap_or_else(|| ExchangeTable::loading(settlement()))
    }

    /// General discount named by the contract
    pub fn general_discount(&self) -> Option<Percentage> {
        self.general_discount
    }

    /// Start a pricing session over the loaded contract
    ///
    /// # Errors
    ///
    /// Returns an error if nothing has been loaded, or if the contract settles in another
    /// currency than `config`.
    pub fn session(&self, config: &PricingConfig) -> Result<PricingSession<'static>, FixtureError> {
        let rates = self.rates.clone().ok_or(FixtureError::NoContract)?;
        let mut session = PricingSession::from_config(config, self.lines.clone(), rates)?;

        if let Some(percent) = self.general_discount {
            session.set_general_discount(percent)?;
        }

        Ok(session)
    }
}

/// Serves the loaded contract's rates.
impl RateProvider for Fixture {
    fn fetch(&self, settlement: &'static Currency) -> Result<ExchangeTable, ExchangeError> {
        let rates = self
            .rates
            .as_ref()
            .ok_or_else(|| ExchangeError::Provider("no contract loaded".to_string()))?;

        if rates.settlement() != settlement {
            return Err(ExchangeError::Provider(format!(
                "contract rates settle in {}",
                rates.settlement().iso_alpha_code
            )));
        }

        Ok(rates.clone())
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use rust_decimal_macros::dec;
    use rusty_money::{
        Money,
        iso::{TRY, USD},
    };
    use tempfile::TempDir;
    use testresult::TestResult;

    use super::*;
    use crate::{discounts::percent_points, exchange::RateState, session::SessionError};

    fn write_contract(base: &Path, name: &str, contents: &str) -> TestResult {
        let dir = base.join("contracts");

        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("{name}.yml")), contents)?;

        Ok(())
    }

    #[test]
    fn fixture_loads_lines_rates_and_general_discount() -> TestResult {
        let fixture = Fixture::from_set("sozlesme")?;

        assert_eq!(fixture.lines().len(), 3);
        assert_eq!(fixture.rates().rate(USD), Ok(dec!(32.50)));
        assert_eq!(
            fixture.general_discount().map(percent_points),
            Some(dec!(20))
        );

        Ok(())
    }

    #[test]
    fn missing_rates_load_as_a_loading_table() -> TestResult {
        let dir = TempDir::new()?;

        write_contract(
            dir.path(),
            "pending",
            "lines:\n  - name: Destek\n    price: 100 USD\n",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());

        fixture.load_contract("pending")?;

        assert_eq!(fixture.rates().state(), &RateState::Loading);
        assert_eq!(fixture.general_discount(), None);

        Ok(())
    }

    #[test]
    fn rates_error_loads_as_a_failed_table() -> TestResult {
        let dir = TempDir::new()?;

        write_contract(
            dir.path(),
            "offline",
            "rates_error: upstream timed out\nrates:\n  USD: 32.5\nlines: []\n",
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());

        fixture.load_contract("offline")?;

        assert!(matches!(fixture.rates().state(), RateState::Failed(_)));

        Ok(())
    }

    #[test]
    fn invalid_rates_are_rejected() -> TestResult {
        let dir = TempDir::new()?;

        write_contract(dir.path(), "bad", "rates:\n  USD: 0\nlines: []\n")?;

        let result = Fixture::with_base_path(dir.path())
            .load_contract("bad")
            .map(|_fixture| ());

        assert!(matches!(
            result,
            Err(FixtureError::Exchange(ExchangeError::InvalidRate { .. }))
        ));

        Ok(())
    }

    #[test]
    fn out_of_range_general_discount_is_rejected() -> TestResult {
        let dir = TempDir::new()?;

        write_contract(dir.path(), "greedy", "general_discount: 120%\nlines: []\n")?;

        let result = Fixture::with_base_path(dir.path())
            .load_contract("greedy")
            .map(|_fixture| ());

        assert!(matches!(
            result,
            Err(FixtureError::Discount(DiscountError::PercentOutOfRange(_)))
        ));

        Ok(())
    }

    #[test]
    fn missing_contract_is_an_io_error() {
        let result = Fixture::from_set("nonexistent");

        assert!(matches!(result, Err(FixtureError::Io(_))));
    }

    #[test]
    fn session_starts_with_the_contract_discount() -> TestResult {
        let fixture = Fixture::from_set("sozlesme")?;
        let session = fixture.session(&PricingConfig::default())?;
        let totals = session.aggregate()?;

        assert_eq!(totals.grand_total(), Money::from_decimal(dec!(3440), TRY));

        Ok(())
    }

    #[test]
    fn session_rejects_a_different_configured_settlement() -> TestResult {
        let config = PricingConfig::from_yaml_str("settlement_currency: USD\n")?;
        let result = Fixture::from_set("sozlesme")?.session(&config);

        assert!(matches!(
            result,
            Err(FixtureError::Session(SessionError::SettlementMismatch {
                configured: "USD",
                rates: "TRY",
            }))
        ));

        Ok(())
    }

    #[test]
    fn fixture_serves_its_rates_for_its_settlement_only() -> TestResult {
        let fixture = Fixture::from_set("sozlesme")?;

        assert_eq!(fixture.fetch(TRY)?.rate(USD), Ok(dec!(32.50)));
        assert!(matches!(fixture.fetch(USD), Err(ExchangeError::Provider(_))));
        assert!(matches!(
            Fixture::new().fetch(TRY),
            Err(ExchangeError::Provider(_))
        ));

        Ok(())
    }

    #[test]
    fn session_requires_a_loaded_contract() {
        let result = Fixture::new().session(&PricingConfig::default());

        assert!(matches!(result, Err(FixtureError::NoContract)));
    }
}
