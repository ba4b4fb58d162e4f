//! Type-safe domain types for the banking example
//!
//! Identifiers and names are validated `nutype` newtypes; amounts are whole
//! cents so arithmetic stays exact.

use nutype::nutype;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when working with [`Money`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The result does not fit in the representable range
    #[error("money amount overflowed: {0} + {1} cents")]
    Overflow(u64, u64),

    /// More money was taken than there was
    #[error("insufficient funds: {available} cents available, {requested} requested")]
    Insufficient {
        /// Cents available
        available: u64,
        /// Cents requested
        requested: u64,
    },
}

/// A non-negative amount of money, in cents.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(u64);

impl Money {
    /// No money at all.
    pub const ZERO: Self = Self(0);

    /// Creates Money from cents (e.g., 1234 = $12.34)
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates Money from whole dollars.
    pub fn from_dollars(dollars: u64) -> Result<Self, MoneyError> {
        dollars
            .checked_mul(100)
            .map(Self)
            .ok_or(MoneyError::Overflow(dollars, 100))
    }

    /// The amount in cents.
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Returns `true` for a zero amount.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MoneyError::Overflow(self.0, other.0))
    }

    /// Subtracts `other`, refusing to go below zero.
    pub fn checked_sub(self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(MoneyError::Insufficient {
                available: self.0,
                requested: other.0,
            })
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Unique identifier for a bank account
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct AccountId(String);

impl AccountId {
    /// A fresh, random account id.
    pub fn generate() -> Self {
        Self::try_new(format!("ACC-{}", Uuid::now_v7().simple()))
            .expect("generated account ids are never empty and fit the length limit")
    }
}

/// Name of an account owner
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 100),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct Owner(String);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn money_displays_as_dollars_and_cents() {
        assert_eq!(Money::from_cents(12_345).to_string(), "$123.45");
        assert_eq!(Money::from_cents(7).to_string(), "$0.07");
        assert_eq!(Money::from_dollars(10).unwrap(), Money::from_cents(1_000));
    }

    #[test]
    fn subtraction_never_goes_negative() {
        let result = Money::from_cents(100).checked_sub(Money::from_cents(101));
        assert_eq!(
            result,
            Err(MoneyError::Insufficient {
                available: 100,
                requested: 101
            })
        );
    }

    #[test]
    fn generated_account_ids_are_distinct() {
        assert_ne!(AccountId::generate(), AccountId::generate());
    }

    #[test]
    fn blank_ids_and_owners_are_rejected() {
        assert!(AccountId::try_new("   ").is_err());
        assert!(Owner::try_new("").is_err());
        assert_eq!(Owner::try_new("  Alex ").unwrap().as_ref(), "Alex");
    }

    proptest! {
        #[test]
        fn add_then_sub_restores_the_amount(a in 0u64..1_000_000_000, b in 0u64..1_000_000_000) {
            let (a, b) = (Money::from_cents(a), Money::from_cents(b));
            prop_assert_eq!(a.checked_add(b).unwrap().checked_sub(b).unwrap(), a);
        }
    }
}
