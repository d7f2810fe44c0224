//! Discount records
//!
//! Discounts attached to plans are persisted as [`StoredDiscount`] values. The engine never
//! talks to storage itself; callers load records through a [`DiscountRepository`] and turn
//! them into [`DiscountSpec`]s.

use rust_decimal::Decimal;
use rusty_money::Money;
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;

use crate::{
    currencies::parse_currency,
    discounts::{DiscountError, DiscountSpec, percent_points},
};

new_key_type! {
    /// Discount record key
    pub struct DiscountKey;
}

/// Errors raised by a discount repository.
#[derive(Debug, Error, PartialEq)]
pub enum RepositoryError {
    /// No record with that key.
    #[error("discount record not found")]
    NotFound,

    /// The record's discount failed validation.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// Serialisable form of a discount.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredDiscount {
    /// No discount
    #[default]
    None,

    /// Percentage off, in points (`10` is 10%)
    Percentage {
        /// Percent points
        value: Decimal,
    },

    /// Fixed amount off
    Amount {
        /// Amount in major units
        value: Decimal,

        /// ISO code (or `TL`)
        currency: String,
    },
}

impl StoredDiscount {
    /// Convert into a validated discount.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is out of range or the currency is not supported.
    pub fn to_spec(&self) -> Result<DiscountSpec<'static>, DiscountError> {
        match self {
            Self::None => Ok(DiscountSpec::None),
            Self::Percentage { value } => DiscountSpec::percentage_points(*value),
            Self::Amount { value, currency } => {
                DiscountSpec::amount(Money::from_decimal(*value, parse_currency(currency)?))
            }
        }
    }
}

impl From<&DiscountSpec<'_>> for StoredDiscount {
    fn from(spec: &DiscountSpec<'_>) -> Self {
        match spec {
            DiscountSpec::None => Self::None,
            DiscountSpec::Percentage(percent) => Self::Percentage {
                value: percent_points(*percent),
            },
            DiscountSpec::Amount(amount) => Self::Amount {
                value: *amount.amount(),
                currency: amount.currency().iso_alpha_code.to_string(),
            },
        }
    }
}

/// A discount attached to a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountRecord {
    /// Key, once stored
    pub key: Option<DiscountKey>,

    /// Owning plan
    pub plan_id: String,

    /// The discount
    pub discount: StoredDiscount,
}

impl DiscountRecord {
    /// A record that has not been stored yet.
    pub fn new(plan_id: impl Into<String>, discount: StoredDiscount) -> Self {
        Self {
            key: None,
            plan_id: plan_id.into(),
            discount,
        }
    }
}

/// Storage for discount records.
pub trait DiscountRepository {
    /// Records belonging to a plan.
    fn list_discounts(&self, plan_id: &str) -> Vec<DiscountRecord>;

    /// Insert a record without a key, or replace the record with its key.
    ///
    /// # Errors
    ///
    /// Returns an error if the discount is invalid or the key is unknown.
    fn upsert(&mut self, record: DiscountRecord) -> Result<DiscountKey, RepositoryError>;

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if the key is unknown.
    fn remove(&mut self, key: DiscountKey) -> Result<DiscountRecord, RepositoryError>;
}

/// Repository held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDiscountRepository {
    records: SlotMap<DiscountKey, DiscountRecord>,
}

impl InMemoryDiscountRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DiscountRepository for InMemoryDiscountRepository {
    fn list_discounts(&self, plan_id: &str) -> Vec<DiscountRecord> {
        self.records
            .values()
            .filter(|record| record.plan_id == plan_id)
            .cloned()
            .collect()
    }

    fn upsert(&mut self, mut record: DiscountRecord) -> Result<DiscountKey, RepositoryError> {
        record.discount.to_spec()?;

        match record.key {
            Some(key) => {
                let stored = self.records.get_mut(key).ok_or(RepositoryError::NotFound)?;

                *stored = record;

                Ok(key)
            }
            None => Ok(self.records.insert_with_key(|key| {
                record.key = Some(key);
                record
            })),
        }
    }

    fn remove(&mut self, key: DiscountKey) -> Result<DiscountRecord, RepositoryError> {
        self.records.remove(key).ok_or(RepositoryError::NotFound)
    }
}
