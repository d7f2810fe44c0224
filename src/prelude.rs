//! Subscription pricing prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    aggregate::{
        AggregateError, AggregateTotal, CurrencyGroup, aggregate, apply_general_discount,
    },
    config::{ConfigError, PricingConfig},
    currencies::{CurrencyError, parse_currency, settlement},
    debounce::Debouncer,
    discounts::{
        AppliedDiscount, DiscountError, DiscountSpec, apply_discount, from_points, percent_points,
    },
    exchange::{
        Conversion, ConversionPolicy, ConversionQuality, ExchangeError, ExchangeTable, RateBook,
        RateProvider, RateState, StaticRateProvider, convert_from_settlement,
        convert_to_settlement,
    },
    format::{format_amount, format_currency, format_discount, format_percent},
    lines::{LineError, LinePricing, PricedLine},
    repository::{
        DiscountKey, DiscountRecord, DiscountRepository, InMemoryDiscountRepository,
        RepositoryError, StoredDiscount,
    },
    session::{DisplayedTotal, PricingSession, SessionError},
    solver::{SolveError, solve_general_discount_for_target, solve_or_keep},
};
