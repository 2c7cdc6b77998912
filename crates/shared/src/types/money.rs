//! Amount type with fixed decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal`, and every amount is limited to
//! [`AMOUNT_SCALE`] fractional digits so storage and arithmetic stay exact.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of fractional digits an amount may carry.
pub const AMOUNT_SCALE: u32 = 18;

/// Errors produced while building or combining amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The input is not a finite decimal number.
    #[error("'{0}' is not a valid decimal amount")]
    Invalid(String),

    /// The input has more fractional digits than the ledger stores.
    #[error("'{0}' exceeds {max} fractional digits", max = AMOUNT_SCALE)]
    TooPrecise(String),

    /// Arithmetic left the representable range.
    #[error("amount overflow")]
    Overflow,

    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left operand.
        left: Currency,
        /// Currency of the right operand.
        right: Currency,
    },

    /// The currency token is blank.
    #[error("currency code must not be empty")]
    EmptyCurrency,
}

/// Currency code, normalized to uppercase.
///
/// Both ISO 4217 codes and custom tokens (e.g. "CREDITS") are accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Creates a currency code, trimming and uppercasing the input.
    pub fn new(code: &str) -> Result<Self, AmountError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AmountError::EmptyCurrency);
        }
        Ok(Self(code.to_uppercase()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Currency {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

/// Parses a decimal string without ever passing through binary floating point.
///
/// Plain (`"100.25"`) and scientific (`"1.5e3"`) notations are accepted.
/// Values needing more than [`AMOUNT_SCALE`] fractional digits are rejected
/// rather than rounded.
pub fn parse_decimal(raw: &str) -> Result<Decimal, AmountError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Invalid(raw.to_string()));
    }

    let value = Decimal::from_str_exact(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| AmountError::Invalid(raw.to_string()))?;

    fit_scale(value).ok_or_else(|| AmountError::TooPrecise(raw.to_string()))
}

/// Drops insignificant trailing zeros only when the value would otherwise
/// exceed the ledger scale.
fn fit_scale(value: Decimal) -> Option<Decimal> {
    let value = if value.scale() > AMOUNT_SCALE {
        value.normalize()
    } else {
        value
    };
    (value.scale() <= AMOUNT_SCALE).then_some(value)
}

/// Adds two decimals, refusing any result that lost fractional digits.
///
/// `Decimal::checked_add` only fails when the sum overflows at scale 0; a
/// wide sum at high scale is silently rounded instead. Trailing zeros are
/// dropped from the operands first so only significant digits count.
#[must_use]
pub fn checked_add_exact(a: Decimal, b: Decimal) -> Option<Decimal> {
    let (a, b) = (a.normalize(), b.normalize());
    let sum = a.checked_add(b)?;
    (sum.scale() >= a.scale().max(b.scale())).then_some(sum)
}

/// Subtracts two decimals, refusing any result that lost fractional digits.
#[must_use]
pub fn checked_sub_exact(a: Decimal, b: Decimal) -> Option<Decimal> {
    checked_add_exact(a, -b)
}

/// A monetary amount tagged with its currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// The decimal value, at most [`AMOUNT_SCALE`] fractional digits.
    pub value: Decimal,
    /// The currency of the value.
    pub currency: Currency,
}

impl Amount {
    /// Creates an amount, rejecting values beyond the ledger scale.
    pub fn new(value: Decimal, currency: Currency) -> Result<Self, AmountError> {
        let value = fit_scale(value).ok_or_else(|| AmountError::TooPrecise(value.to_string()))?;
        Ok(Self { value, currency })
    }

    /// Parses a decimal string into an amount.
    pub fn parse(raw: &str, currency: Currency) -> Result<Self, AmountError> {
        Ok(Self {
            value: parse_decimal(raw)?,
            currency,
        })
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self {
            value: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Returns true if the amount is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Returns true if the amount is strictly less than zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.value < Decimal::ZERO
    }

    /// Adds two amounts of the same currency.
    pub fn checked_add(&self, other: &Self) -> Result<Self, AmountError> {
        if self.currency != other.currency {
            return Err(AmountError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        let value = checked_add_exact(self.value, other.value).ok_or(AmountError::Overflow)?;
        Ok(Self {
            value,
            currency: self.currency.clone(),
        })
    }

    /// Returns the amount with its sign flipped.
    #[must_use]
    pub fn negated(&self) -> Self {
        Self {
            value: -self.value,
            currency: self.currency.clone(),
        }
    }

    /// The textual form used for storage and the wire.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        self.value.to_string()
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}
