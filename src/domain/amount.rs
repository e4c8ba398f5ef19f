use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Immutable money value. Arithmetic requires equal currencies and every
/// operation returns a new instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    value: Decimal,
    currency: String,
}

impl Amount {
    pub fn new(value: Decimal, currency: &str) -> Result<Self, DomainError> {
        if value < Decimal::ZERO {
            return Err(DomainError::InvalidAmount(format!(
                "amount cannot be negative, got {value}"
            )));
        }
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::InvalidAmount(format!(
                "currency must be a 3-letter ISO code, got {currency:?}"
            )));
        }
        Ok(Self {
            value,
            currency: currency.to_ascii_uppercase(),
        })
    }

    pub fn from_cents(cents: i64, currency: &str) -> Result<Self, DomainError> {
        if cents < 0 {
            return Err(DomainError::InvalidAmount(format!(
                "amount cannot be negative, got {cents} cents"
            )));
        }
        Self::new(Decimal::new(cents, 2), currency)
    }

    /// Whole cents, truncating any sub-cent precision. Values past the `i64`
    /// range saturate at `i64::MAX`.
    pub fn to_cents(&self) -> i64 {
        (self.value * Decimal::from(100)).trunc().to_i64().unwrap_or(i64::MAX)
    }

    /// A zero amount in the same currency as `self`.
    pub fn zero_like(&self) -> Self {
        Self {
            value: Decimal::ZERO,
            currency: self.currency.clone(),
        }
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount, DomainError> {
        self.require_same_currency(other)?;
        Ok(Self {
            value: self.value + other.value,
            currency: self.currency.clone(),
        })
    }

    /// Subtraction never yields a negative amount.
    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, DomainError> {
        self.require_same_currency(other)?;
        let result = self.value - other.value;
        if result < Decimal::ZERO {
            return Err(DomainError::InvalidAmount(format!(
                "subtraction would result in negative amount: {result}"
            )));
        }
        Ok(Self {
            value: result,
            currency: self.currency.clone(),
        })
    }

    fn require_same_currency(&self, other: &Amount) -> Result<(), DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value.round_dp(2), self.currency)
    }
}
