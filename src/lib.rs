//! Subscription Pricing
//!
//! Pricing arithmetic for a subscription and billing back office: percentage and
//! fixed-amount discounts, multi-currency totals settled in Turkish lira, a general discount
//! layered on top of line discounts, and an inverse mode that derives the general discount
//! from a typed target total.
//!
//! The engine is pure and single-threaded. Callers own the lines and exchange rates, pass
//! in the current [`std::time::Instant`] where timing matters, and render the results.

pub mod aggregate;
pub mod config;
pub mod currencies;
pub mod debounce;
pub mod discounts;
pub mod exchange;
pub mod fixtures;
pub mod format;
pub mod lines;
pub mod prelude;
pub mod repository;
pub mod session;
pub mod solver;
pub mod summary;
