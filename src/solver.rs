//! Inverse discount solving
//!
//! When a user overwrites a displayed total, the general discount rate that produces it is
//! derived from the total before the general discount.

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::debug;

/// Errors raised while solving for a discount rate.
#[derive(Debug, Error, PartialEq)]
pub enum SolveError {
    /// Target and original totals are in different currencies.
    #[error("target is in {target}, but the total is in {original}")]
    CurrencyMismatch {
        /// Currency of the original total
        original: &'static str,

        /// Currency of the typed target
        target: &'static str,
    },

    /// Decimal arithmetic overflowed.
    #[error("discount solve overflowed")]
    Overflow,
}

/// Derive the percentage that turns `original` into `target`.
///
/// The result is `1 - target / original`, clamped into 0–100%. Returns `Ok(None)` when
/// `original` is zero or negative: there is no meaningful rate, and callers keep the one
/// they already have.
///
/// # Errors
///
/// Returns an error if:
/// - the amounts are in different currencies (`SolveError::CurrencyMismatch`).
/// - decimal arithmetic overflows (`SolveError::Overflow`).
pub fn solve_general_discount_for_target(
    original: &Money<'_, Currency>,
    target: &Money<'_, Currency>,
) -> Result<Option<Percentage>, SolveError> {
    if original.currency() != target.currency() {
        return Err(SolveError::CurrencyMismatch {
            original: original.currency().iso_alpha_code,
            target: target.currency().iso_alpha_code,
        });
    }

    let original_amount = *original.amount();

    if original_amount <= Decimal::ZERO {
        debug!(
            currency = original.currency().iso_alpha_code,
            "no discount rate for a non-positive total; keeping the previous rate"
        );

        return Ok(None);
    }

    let ratio = target
        .amount()
        .checked_div(original_amount)
        .ok_or(SolveError::Overflow)?;

    let fraction = Decimal::ONE
        .checked_sub(ratio)
        .ok_or(SolveError::Overflow)?
        .clamp(Decimal::ZERO, Decimal::ONE);

    Ok(Some(Percentage::from(fraction)))
}

/// Like [`solve_general_discount_for_target`], falling back to `previous` when the solve is
/// undefined.
///
/// # Errors
///
/// See [`solve_general_discount_for_target`].
pub fn solve_or_keep(
    original: &Money<'_, Currency>,
    target: &Money<'_, Currency>,
    previous: Percentage,
) -> Result<Percentage, SolveError> {
    Ok(solve_general_discount_for_target(original, target)?.unwrap_or(previous))
}
