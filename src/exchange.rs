//! Exchange rates
//!
//! Rates are quoted as settlement-currency units per one unit of a foreign currency
//! (e.g. `USD → 32.50` means one dollar is ₺32,50). A table is a point-in-time snapshot
//! that may still be loading or may have failed to load.
//!
//! When a conversion cannot be performed the default [`ConversionPolicy::Identity`] keeps
//! the screens usable: the unconverted amount is relabelled as the target currency, the
//! result is flagged [`ConversionQuality::Degraded`] and a warning is logged. The totals are
//! then wrong, which is why [`ConversionPolicy::Strict`] exists for callers that would
//! rather show "rates unavailable".

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::{ConfigError, PricingConfig},
    currencies::{CurrencyError, is_supported, parse_currency},
};

/// Errors raised by currency conversion and rate loading.
#[derive(Debug, Error, PartialEq)]
pub enum ExchangeError {
    /// No usable rate, and the table is configured to refuse degraded conversions.
    #[error("exchange rates unavailable for {currency}: {reason}")]
    RatesUnavailable {
        /// Currency that could not be converted
        currency: &'static str,

        /// Why no rate was available
        reason: String,
    },

    /// A rate was zero or negative.
    #[error("invalid exchange rate {rate} for {currency}")]
    InvalidRate {
        /// Currency the rate was quoted for
        currency: &'static str,

        /// The rejected rate
        rate: Decimal,
    },

    /// `convert_from_settlement` was handed an amount that is not in the settlement currency.
    #[error("amount is in {0}, not the settlement currency")]
    NotSettlement(&'static str),

    /// A rate was quoted for a currency outside the supported set.
    #[error(transparent)]
    Currency(#[from] CurrencyError),

    /// The rate source failed.
    #[error("rate provider failed: {0}")]
    Provider(String),

    /// Decimal arithmetic overflowed.
    #[error("currency conversion overflowed")]
    Overflow,
}

/// What to do when a conversion has no usable rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionPolicy {
    /// Treat the amount as if it were already in the target currency, and flag it.
    #[default]
    Identity,

    /// Return [`ExchangeError::RatesUnavailable`].
    Strict,
}

/// Whether a converted amount can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionQuality {
    /// Converted with a real rate, or no conversion was needed.
    #[default]
    Exact,

    /// Relabelled without a rate.
    Degraded,
}

impl ConversionQuality {
    /// Degraded if either side is degraded.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        if self == Self::Degraded || other == Self::Degraded {
            Self::Degraded
        } else {
            Self::Exact
        }
    }
}

/// A converted amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion<'a> {
    /// Amount in the target currency
    pub money: Money<'a, Currency>,

    /// Whether a real rate was used
    pub quality: ConversionQuality,
}

impl<'a> Conversion<'a> {
    fn exact(money: Money<'a, Currency>) -> Self {
        Self {
            money,
            quality: ConversionQuality::Exact,
        }
    }

    /// Whether the conversion fell back to relabelling.
    pub fn is_degraded(&self) -> bool {
        self.quality == ConversionQuality::Degraded
    }
}

/// Loading state of a rate snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RateState {
    /// The first fetch has not completed yet.
    Loading,

    /// The last fetch failed.
    Failed(String),

    /// Rates keyed by ISO code.
    Ready(FxHashMap<&'static str, Decimal>),
}

/// Exchange rates against the settlement currency.
#[derive(Debug, Clone)]
pub struct ExchangeTable {
    settlement: &'static Currency,
    state: RateState,
    policy: ConversionPolicy,
}

impl ExchangeTable {
    /// A table whose rates have not arrived yet.
    pub fn loading(settlement: &'static Currency) -> Self {
        Self {
            settlement,
            state: RateState::Loading,
            policy: ConversionPolicy::default(),
        }
    }

    /// A table whose rates failed to load.
    pub fn failed(settlement: &'static Currency, reason: impl Into<String>) -> Self {
        Self {
            settlement,
            state: RateState::Failed(reason.into()),
            policy: ConversionPolicy::default(),
        }
    }

    /// A table with rates.
    ///
    /// Rates quoted for the settlement currency itself are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a rate is not strictly positive (`ExchangeError::InvalidRate`) or a
    /// currency is outside the supported set (`ExchangeError::Currency`).
    pub fn ready(
        settlement: &'static Currency,
        rates: impl IntoIterator<Item = (&'static Currency, Decimal)>,
    ) -> Result<Self, ExchangeError> {
        let mut table = FxHashMap::default();

        for (currency, rate) in rates {
            if !is_supported(currency) {
                return Err(CurrencyError::Unsupported(currency.iso_alpha_code.to_string()).into());
            }

            if rate <= Decimal::ZERO {
                return Err(ExchangeError::InvalidRate {
                    currency: currency.iso_alpha_code,
                    rate,
                });
            }

            if currency == settlement {
                continue;
            }

            table.insert(currency.iso_alpha_code, rate);
        }

        Ok(Self {
            settlement,
            state: RateState::Ready(table),
            policy: ConversionPolicy::default(),
        })
    }

    /// A table with rates keyed by currency code (`"USD"`, `"EUR"`, `"TL"`).
    ///
    /// # Errors
    ///
    /// See [`ExchangeTable::ready`].
    pub fn from_codes<S: AsRef<str>>(
        settlement: &'static Currency,
        rates: impl IntoIterator<Item = (S, Decimal)>,
    ) -> Result<Self, ExchangeError> {
        let parsed = rates
            .into_iter()
            .map(|(code, rate)| -> Result<_, ExchangeError> {
                Ok((parse_currency(code.as_ref())?, rate))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::ready(settlement, parsed)
    }

    /// Replace the conversion policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ConversionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Currency every total is settled in.
    pub fn settlement(&self) -> &'static Currency {
        self.settlement
    }

    /// Loading state of the snapshot.
    pub fn state(&self) -> &RateState {
        &self.state
    }

    /// Policy applied when no rate is usable.
    pub fn policy(&self) -> ConversionPolicy {
        self.policy
    }

    /// Whether rates have arrived.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, RateState::Ready(_))
    }

    /// Rate for a currency, `1` for the settlement currency.
    ///
    /// # Errors
    ///
    /// Returns the reason no rate is available.
    pub fn rate(&self, currency: &Currency) -> Result<Decimal, String> {
        if currency == self.settlement {
            return Ok(Decimal::ONE);
        }

        match &self.state {
            RateState::Loading => Err("exchange rates are still loading".to_string()),
            RateState::Failed(reason) => Err(reason.clone()),
            RateState::Ready(rates) => rates
                .get(currency.iso_alpha_code)
                .copied()
                .ok_or_else(|| format!("no rate quoted for {}", currency.iso_alpha_code)),
        }
    }

    /// Convert an amount into the settlement currency.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - no rate is usable and the policy is [`ConversionPolicy::Strict`]
    ///   (`ExchangeError::RatesUnavailable`).
    /// - decimal arithmetic overflows (`ExchangeError::Overflow`).
    pub fn to_settlement<'a>(
        &self,
        amount: &Money<'a, Currency>,
    ) -> Result<Conversion<'a>, ExchangeError> {
        if amount.currency() == self.settlement {
            return Ok(Conversion::exact(*amount));
        }

        match self.rate(amount.currency()) {
            Ok(rate) => {
                let converted = amount
                    .amount()
                    .checked_mul(rate)
                    .ok_or(ExchangeError::Overflow)?;

                Ok(Conversion::exact(Money::from_decimal(
                    converted,
                    self.settlement,
                )))
            }
            Err(reason) => self.degraded(amount, self.settlement, reason),
        }
    }

    /// Convert a settlement-currency amount into `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `amount` is not in the settlement currency (`ExchangeError::NotSettlement`).
    /// - no rate is usable and the policy is [`ConversionPolicy::Strict`]
    ///   (`ExchangeError::RatesUnavailable`).
    /// - decimal arithmetic overflows (`ExchangeError::Overflow`).
    pub fn from_settlement<'a>(
        &self,
        amount: &Money<'a, Currency>,
        target: &'a Currency,
    ) -> Result<Conversion<'a>, ExchangeError> {
        if amount.currency() != self.settlement {
            return Err(ExchangeError::NotSettlement(
                amount.currency().iso_alpha_code,
            ));
        }

        if target == self.settlement {
            return Ok(Conversion::exact(*amount));
        }

        match self.rate(target) {
            Ok(rate) => {
                let converted = amount
                    .amount()
                    .checked_div(rate)
                    .ok_or(ExchangeError::Overflow)?;

                Ok(Conversion::exact(Money::from_decimal(converted, target)))
            }
            Err(reason) => self.degraded(amount, target, reason),
        }
    }

    fn degraded<'a>(
        &self,
        amount: &Money<'a, Currency>,
        target: &'a Currency,
        reason: String,
    ) -> Result<Conversion<'a>, ExchangeError> {
        match self.policy {
            ConversionPolicy::Strict => Err(ExchangeError::RatesUnavailable {
                currency: amount.currency().iso_alpha_code,
                reason,
            }),
            ConversionPolicy::Identity => {
                warn!(
                    from = amount.currency().iso_alpha_code,
                    to = target.iso_alpha_code,
                    %reason,
                    "converting without an exchange rate; amount relabelled unchanged"
                );

                Ok(Conversion {
                    money: Money::from_decimal(*amount.amount(), target),
                    quality: ConversionQuality::Degraded,
                })
            }
        }
    }
}

/// Convert an amount into the settlement currency of `rates`.
///
/// # Errors
///
/// See [`ExchangeTable::to_settlement`].
pub fn convert_to_settlement<'a>(
    amount: &Money<'a, Currency>,
    rates: &ExchangeTable,
) -> Result<Conversion<'a>, ExchangeError> {
    rates.to_settlement(amount)
}

/// Convert a settlement-currency amount into `target`.
///
/// # Errors
///
/// See [`ExchangeTable::from_settlement`].
pub fn convert_from_settlement<'a>(
    amount: &Money<'a, Currency>,
    target: &'a Currency,
    rates: &ExchangeTable,
) -> Result<Conversion<'a>, ExchangeError> {
    rates.from_settlement(amount, target)
}

/// Source of exchange rates.
pub trait RateProvider {
    /// Fetch a fresh snapshot against `settlement`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is unreachable or returns unusable rates.
    fn fetch(&self, settlement: &'static Currency) -> Result<ExchangeTable, ExchangeError>;
}

/// Serves a fixed set of rates.
#[derive(Debug, Clone, Default)]
pub struct StaticRateProvider {
    rates: Vec<(&'static Currency, Decimal)>,
}

impl StaticRateProvider {
    /// Create a provider for the given rates.
    pub fn new(rates: impl IntoIterator<Item = (&'static Currency, Decimal)>) -> Self {
        Self {
            rates: rates.into_iter().collect(),
        }
    }
}

impl RateProvider for StaticRateProvider {
    fn fetch(&self, settlement: &'static Currency) -> Result<ExchangeTable, ExchangeError> {
        ExchangeTable::ready(settlement, self.rates.iter().copied())
    }
}

/// Keeps the current rate snapshot and decides when to refetch it.
///
/// A refresh started while rates are already available keeps serving them until the new
/// snapshot lands. A failed fetch replaces the snapshot with [`RateState::Failed`].
#[derive(Debug)]
pub struct RateBook {
    table: ExchangeTable,
    fetched_at: Option<Instant>,
    refresh_interval: Duration,
    policy: ConversionPolicy,
}

impl RateBook {
    /// Create a book in the loading state.
    pub fn new(
        settlement: &'static Currency,
        refresh_interval: Duration,
        policy: ConversionPolicy,
    ) -> Self {
        Self {
            table: ExchangeTable::loading(settlement).with_policy(policy),
            fetched_at: None,
            refresh_interval,
            policy,
        }
    }

    /// Create a book for the configured settlement currency, refresh interval and policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured settlement currency is not supported.
    pub fn from_config(config: &PricingConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.settlement()?,
            config.rate_refresh_interval(),
            config.conversion_policy,
        ))
    }

    /// Current snapshot.
    pub fn table(&self) -> &ExchangeTable {
        &self.table
    }

    /// Whether a fetch is due at `now`.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.fetched_at
            .is_none_or(|at| now.saturating_duration_since(at) >= self.refresh_interval)
    }

    /// Mark a fetch as started.
    pub fn begin_refresh(&mut self) {
        if !self.table.is_ready() {
            self.table = ExchangeTable::loading(self.table.settlement()).with_policy(self.policy);
        }
    }

    /// Store the outcome of a fetch.
    pub fn finish_refresh(&mut self, result: Result<ExchangeTable, ExchangeError>, now: Instant) {
        let settlement = self.table.settlement();

        self.table = match result {
            Ok(table) => {
                debug!(settlement = settlement.iso_alpha_code, "exchange rates refreshed");

                table.with_policy(self.policy)
            }
            Err(err) => {
                warn!(error = %err, "exchange rate refresh failed");

                ExchangeTable::failed(settlement, err.to_string()).with_policy(self.policy)
            }
        };

        self.fetched_at = Some(now);
    }

    /// Fetch from `provider` now.
    pub fn refresh(&mut self, provider: &impl RateProvider, now: Instant) -> &ExchangeTable {
        self.begin_refresh();

        let result = provider.fetch(self.table.settlement());

        self.finish_refresh(result, now);

        &self.table
    }

    /// Fetch from `provider` only when the snapshot is stale.
    pub fn refresh_if_stale(
        &mut self,
        provider: &impl RateProvider,
        now: Instant,
    ) -> &ExchangeTable {
        if self.is_stale(now) {
            return self.refresh(provider, now);
        }

        &self.table
    }
}
