// Copyright (c) 2025 - Cowboy AI, Inc.
//! Signed amount value object
//!
//! Ledger amounts are signed decimals. Negative amounts are debits, positive
//! amounts are credits; projections track both legs separately and derive the
//! net as `credit - debit`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DomainError;

/// Signed monetary amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedAmount(Decimal);

impl SignedAmount {
    /// Wrap a decimal
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Wrap a decimal, rejecting zero
    pub fn non_zero(value: Decimal) -> Result<Self, DomainError> {
        if value.is_zero() {
            return Err(DomainError::InvalidAmount("amount cannot be zero".into()));
        }
        Ok(Self(value))
    }

    /// Amount from separate legs: `credit - debit`
    pub fn from_legs(debit: Decimal, credit: Decimal) -> Result<Self, DomainError> {
        if debit.is_sign_negative() || credit.is_sign_negative() {
            return Err(DomainError::InvalidAmount(
                "debit and credit must not be negative".into(),
            ));
        }
        Ok(Self(credit - debit))
    }

    /// Debit leg (absolute value of a negative amount, else zero)
    pub fn debit(&self) -> Decimal {
        if self.0.is_sign_negative() {
            self.0.abs()
        } else {
            Decimal::ZERO
        }
    }

    /// Credit leg (positive amount, else zero)
    pub fn credit(&self) -> Decimal {
        if self.0.is_sign_positive() {
            self.0
        } else {
            Decimal::ZERO
        }
    }

    /// Net amount
    pub fn net(&self) -> Decimal {
        self.credit() - self.debit()
    }

    /// Raw signed value
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl From<Decimal> for SignedAmount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl fmt::Display for SignedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use test_case::test_case;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test_case("150.00", "0", "150.00" ; "credit")]
    #[test_case("-42.50", "42.50", "0" ; "debit")]
    #[test_case("0", "0", "0" ; "zero")]
    fn test_legs(amount: &str, debit: &str, credit: &str) {
        let amount = SignedAmount::new(dec(amount));
        assert_eq!(amount.debit(), dec(debit));
        assert_eq!(amount.credit(), dec(credit));
        assert_eq!(amount.net(), amount.value());
    }

    #[test]
    fn test_non_zero_rejects_zero() {
        assert!(SignedAmount::non_zero(Decimal::ZERO).is_err());
        assert!(SignedAmount::non_zero(dec("0.01")).is_ok());
    }

    #[test]
    fn test_from_legs() {
        let amount = SignedAmount::from_legs(dec("30"), dec("100")).unwrap();
        assert_eq!(amount.value(), dec("70"));

        assert!(SignedAmount::from_legs(dec("-1"), dec("0")).is_err());
    }
}
