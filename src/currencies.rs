//! Currencies
//!
//! Plans, products and contract modules are priced in a small fixed set of currencies.
//! Multi-currency totals are always settled in Turkish lira.

use rusty_money::iso::{Currency, EUR, TRY, USD};
use thiserror::Error;

/// Errors raised while resolving a currency code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurrencyError {
    /// The code is not one of TRY (TL), USD or EUR.
    #[error("unsupported currency code: {0}")]
    Unsupported(String),
}

/// Currency all aggregates are settled in.
pub fn settlement() -> &'static Currency {
    TRY
}

/// Resolve a currency code (or its display symbol) into a supported currency.
///
/// `TL` is accepted as an alias for `TRY`, and codes are matched case-insensitively.
///
/// # Errors
///
/// Returns [`CurrencyError::Unsupported`] for anything outside the supported set.
pub fn parse_currency(code: &str) -> Result<&'static Currency, CurrencyError> {
    let trimmed = code.trim();

    match trimmed.to_ascii_uppercase().as_str() {
        "TRY" | "TL" | "₺" => Ok(TRY),
        "USD" | "$" => Ok(USD),
        "EUR" | "€" => Ok(EUR),
        _ => Err(CurrencyError::Unsupported(trimmed.to_string())),
    }
}

/// Whether a currency belongs to the supported set.
pub fn is_supported(currency: &Currency) -> bool {
    parse_currency(currency.iso_alpha_code).is_ok()
}

/// Display symbol for a currency, falling back to its ISO code.
pub fn symbol(currency: &Currency) -> &'static str {
    match currency.iso_alpha_code {
        "TRY" => "₺",
        "USD" => "$",
        "EUR" => "€",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::GBP;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parse_currency_accepts_codes_and_aliases() -> TestResult {
        assert_eq!(parse_currency("TRY")?, TRY);
        assert_eq!(parse_currency("tl")?, TRY);
        assert_eq!(parse_currency(" usd ")?, USD);
        assert_eq!(parse_currency("EUR")?, EUR);
        assert_eq!(parse_currency("€")?, EUR);

        Ok(())
    }

    #[test]
    fn parse_currency_rejects_unsupported_codes() {
        assert_eq!(
            parse_currency("GBP"),
            Err(CurrencyError::Unsupported("GBP".to_string()))
        );
    }

    #[test]
    fn symbol_lookup() {
        assert_eq!(symbol(TRY), "₺");
        assert_eq!(symbol(USD), "$");
        assert_eq!(symbol(EUR), "€");
        assert_eq!(symbol(GBP), "GBP");
    }

    #[test]
    fn settlement_is_lira() {
        assert_eq!(settlement(), TRY);
        assert!(is_supported(settlement()));
        assert!(!is_supported(GBP));
    }
}
