//! Pricing session
//!
//! State behind one pricing view: the lines being quoted, the current exchange rates, the
//! general discount rate, and a typed target total waiting out its debounce window.
//!
//! Totals are never cached. Every read recomputes from the lines, so a changed line,
//! quantity or rate is reflected immediately.

use std::time::{Duration, Instant};

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    aggregate::{AggregateError, AggregateTotal, aggregate, apply_general_discount},
    config::{ConfigError, PricingConfig},
    debounce::Debouncer,
    discounts::{DiscountError, DiscountSpec},
    exchange::{ExchangeTable, RateBook, RateProvider},
    lines::{LineError, PricedLine},
};

/// Errors raised by session edits.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No line at the given position.
    #[error("no line at position {0}")]
    UnknownLine(usize),

    /// Rejected discount input.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Rejected line input.
    #[error(transparent)]
    Line(#[from] LineError),

    /// Totals could not be computed.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The rates settle in a different currency than the configured one.
    #[error("rates settle in {rates}, but {configured} is configured")]
    SettlementMismatch {
        /// Configured settlement currency
        configured: &'static str,

        /// Settlement currency of the rate table
        rates: &'static str,
    },
}

/// A currency group's total as the view should show it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayedTotal<'a> {
    /// Group currency
    pub currency: &'a Currency,

    /// Amount to display
    pub amount: Money<'a, Currency>,

    /// Whether `amount` is a typed value that has not been committed yet
    pub pending: bool,
}

/// One pricing view.
#[derive(Debug)]
pub struct PricingSession<'a> {
    lines: Vec<PricedLine<'a>>,
    rates: ExchangeTable,
    general_discount: Percentage,
    target_edit: Debouncer<Money<'a, Currency>>,
    commits: usize,
}

impl<'a> PricingSession<'a> {
    /// Create a session with no general discount.
    pub fn new(lines: Vec<PricedLine<'a>>, rates: ExchangeTable, window: Duration) -> Self {
        Self {
            lines,
            rates,
            general_discount: Percentage::from(Decimal::ZERO),
            target_edit: Debouncer::new(window),
            commits: 0,
        }
    }

    /// Create a session using the configured debounce window and conversion policy.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SettlementMismatch`] if `rates` do not settle in the
    /// configured currency.
    pub fn from_config(
        config: &PricingConfig,
        lines: Vec<PricedLine<'a>>,
        rates: ExchangeTable,
    ) -> Result<Self, SessionError> {
        let configured = config.settlement()?;

        if rates.settlement() != configured {
            return Err(SessionError::SettlementMismatch {
                configured: configured.iso_alpha_code,
                rates: rates.settlement().iso_alpha_code,
            });
        }

        Ok(Self::new(
            lines,
            rates.with_policy(config.conversion_policy),
            config.debounce_window(),
        ))
    }

    /// Lines in display order.
    pub fn lines(&self) -> &[PricedLine<'a>] {
        &self.lines
    }

    /// Current exchange rates.
    pub fn rates(&self) -> &ExchangeTable {
        &self.rates
    }

    /// Committed general discount rate.
    pub fn general_discount(&self) -> Percentage {
        self.general_discount
    }

    /// Typed target total that has not been committed yet.
    pub fn pending_target(&self) -> Option<&Money<'a, Currency>> {
        self.target_edit.pending()
    }

    /// Number of target edits committed so far.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Replace every line.
    pub fn set_lines(&mut self, lines: Vec<PricedLine<'a>>) {
        self.lines = lines;
    }

    /// Append a line.
    pub fn push_line(&mut self, line: PricedLine<'a>) {
        self.lines.push(line);
    }

    /// Replace the discount on one line.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such line or the discount is out of range.
    pub fn update_line_discount(
        &mut self,
        index: usize,
        discount: DiscountSpec<'a>,
    ) -> Result<(), SessionError> {
        discount.validate()?;

        self.line_mut(index)?.set_discount(discount);

        Ok(())
    }

    /// Replace the quantity on one line.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such line or the quantity is zero.
    pub fn set_quantity(&mut self, index: usize, quantity: u32) -> Result<(), SessionError> {
        self.line_mut(index)?.set_quantity(quantity)?;

        Ok(())
    }

    /// Swap in a new rate snapshot, keeping the session's conversion policy.
    pub fn set_rates(&mut self, rates: ExchangeTable) {
        let policy = self.rates.policy();

        self.rates = rates.with_policy(policy);
    }

    /// Pull rates from `book`, refetching them from `provider` first if they are stale.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SettlementMismatch`] if the book settles in another currency.
    pub fn refresh_rates(
        &mut self,
        book: &mut RateBook,
        provider: &impl RateProvider,
        now: Instant,
    ) -> Result<(), SessionError> {
        let table = book.refresh_if_stale(provider, now);

        if table.settlement() != self.rates.settlement() {
            return Err(SessionError::SettlementMismatch {
                configured: self.rates.settlement().iso_alpha_code,
                rates: table.settlement().iso_alpha_code,
            });
        }

        self.set_rates(table.clone());

        Ok(())
    }

    /// Set the general discount directly, discarding any typed target total.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::PercentOutOfRange`] outside 0–100%.
    pub fn set_general_discount(&mut self, percent: Percentage) -> Result<(), SessionError> {
        DiscountSpec::Percentage(percent).validate()?;

        if self.target_edit.cancel().is_some() {
            debug!("direct rate edit discarded a pending target total");
        }

        self.general_discount = percent;

        Ok(())
    }

    /// Totals with the committed general discount applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a line cannot be priced or a group cannot be converted.
    pub fn aggregate(&self) -> Result<AggregateTotal<'a>, SessionError> {
        let base = aggregate(&self.lines, &self.rates)?;

        Ok(apply_general_discount(
            &base,
            self.general_discount,
            &self.rates,
        )?)
    }

    /// Record a typed target total. It is committed by [`PricingSession::poll`] once no
    /// further edit arrives within the debounce window.
    pub fn edit_target_total(&mut self, target: Money<'a, Currency>, now: Instant) {
        self.target_edit.push(target, now);
    }

    /// Commit a pending target total whose window has elapsed.
    ///
    /// Returns the general discount rate after the commit, or `None` if nothing was due.
    /// When the rate cannot be derived (the group total is not positive, or no lines are
    /// priced in the target's currency) the previous rate is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the totals cannot be computed.
    pub fn poll(&mut self, now: Instant) -> Result<Option<Percentage>, SessionError> {
        let Some(target) = self.target_edit.poll(now) else {
            return Ok(None);
        };

        let base = aggregate(&self.lines, &self.rates)?;

        match base.solve_for_target(&target) {
            Ok(Some(percent)) => self.general_discount = percent,
            Ok(None) => {
                debug!(
                    currency = target.currency().iso_alpha_code,
                    "target total left the general discount unchanged"
                );
            }
            Err(AggregateError::MissingGroup(currency)) => {
                warn!(currency, "no lines priced in the target currency; keeping rate");
            }
            Err(err) => return Err(err.into()),
        }

        self.commits += 1;

        Ok(Some(self.general_discount))
    }

    /// Per-currency totals to display.
    ///
    /// Every group shows its total under the committed rate, except the group whose
    /// target total is being typed, which shows the typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the totals cannot be computed.
    pub fn currency_totals(&self) -> Result<SmallVec<[DisplayedTotal<'a>; 3]>, SessionError> {
        let totals = self.aggregate()?;
        let pending = self.target_edit.pending();

        Ok(totals
            .groups()
            .iter()
            .map(|group| match pending {
                Some(target) if target.currency() == group.currency => DisplayedTotal {
                    currency: group.currency,
                    amount: *target,
                    pending: true,
                },
                _ => DisplayedTotal {
                    currency: group.currency,
                    amount: group.total,
                    pending: false,
                },
            })
            .collect())
    }

    fn line_mut(&mut self, index: usize) -> Result<&mut PricedLine<'a>, SessionError> {
        self.lines
            .get_mut(index)
            .ok_or(SessionError::UnknownLine(index))
    }
}
