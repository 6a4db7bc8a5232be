//! Fixed-scale decimal amounts
//!
//! Every monetary value in the ledger is an [`Amount`]: an exact decimal held
//! at a scale of 4 fractional digits. Amounts are built on
//! [`rust_decimal::Decimal`], so additions never drift the way binary floating
//! point does across a long transaction history.
//!
//! # Rounding
//!
//! Input is rounded half-away-from-zero to 4 digits (`1.23455` becomes
//! `1.2346`, `-1.23455` becomes `-1.2346`). Rounding is idempotent.
//!
//! # Parsing
//!
//! - [`Amount::parse`] accepts plain or scientific notation and rounds.
//! - [`Amount::parse_exact`] additionally rejects input that rounding would
//!   change, which is how the engine enforces "at most 4 fractional digits".
//!   The digit count is taken from the text itself, since `rust_decimal`
//!   silently rounds input longer than its 28-digit mantissa.
//! - [`Amount::from_f64`] accepts floating input and rejects NaN and infinities.
//!
//! # Serialization
//!
//! Amounts serialize as JSON numbers written from their decimal text, never
//! through `f64`, so large balances keep every digit.

use super::error::LedgerError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits carried by every [`Amount`]
pub const SCALE: u32 = 4;

/// Exact decimal value with a fixed scale of 4 fractional digits
///
/// Two amounts compare equal when they are numerically equal, regardless of
/// how many trailing zeros their source text had.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// The zero amount
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Round a decimal to 4 fractional digits, half away from zero
    ///
    /// Negative zero collapses to zero so that `-0.00001` renders as `0.0000`.
    pub fn round(value: Decimal) -> Self {
        let rounded = value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
        if rounded.is_zero() {
            Amount(Decimal::ZERO)
        } else {
            Amount(rounded)
        }
    }

    /// Parse a decimal string and round it to 4 fractional digits
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] if the text is empty or is not a
    /// finite decimal number representable by `rust_decimal`.
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        parse_decimal(raw).map(Self::round)
    }

    /// Parse a decimal string that must already fit in 4 fractional digits
    ///
    /// Trailing zeros are fine (`"1.50000"` parses), significant digits past
    /// the fourth are not (`"1.00001"` fails).
    pub fn parse_exact(raw: &str) -> Result<Self, LedgerError> {
        let value = parse_decimal(raw)?;
        exact(value, raw)
    }

    /// Convert a floating point value and round it to 4 fractional digits
    ///
    /// The conversion goes through the shortest decimal representation of the
    /// float, so `0.1` becomes exactly `0.1000`.
    pub fn from_f64(value: f64) -> Result<Self, LedgerError> {
        f64_to_decimal(value).map(Self::round)
    }

    /// Convert a floating point value that must already fit in 4 fractional digits
    pub fn from_f64_exact(value: f64) -> Result<Self, LedgerError> {
        let decimal = f64_to_decimal(value)?;
        exact(decimal, &value.to_string())
    }

    /// Underlying decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Exact addition, `None` on overflow
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Exact subtraction, `None` on overflow
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Same magnitude, opposite sign
    pub fn negate(self) -> Amount {
        if self.0.is_zero() {
            self
        } else {
            Amount(-self.0)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, LedgerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::invalid_amount(raw, "value is empty"));
    }

    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| LedgerError::invalid_amount(raw, "not a finite decimal number"))
}

fn f64_to_decimal(value: f64) -> Result<Decimal, LedgerError> {
    let text = value.to_string();
    if !value.is_finite() {
        return Err(LedgerError::invalid_amount(&text, "not a finite number"));
    }

    Decimal::from_str(&text).map_err(|_| LedgerError::invalid_amount(&text, "out of range"))
}

/// Significant fractional digits written in `text`, trailing zeros excluded
///
/// `None` when the exponent is unreadable, which parsing rejects.
fn written_scale(text: &str) -> Option<i64> {
    let (mantissa, exponent) = match text.find(|c: char| c == 'e' || c == 'E') {
        Some(at) => (&text[..at], text[at + 1..].parse::<i64>().ok()?),
        None => (text, 0),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let significant = fraction.trim_end_matches('0');
    let trailing_zeros = if significant.is_empty() {
        fraction.len() + whole.len() - whole.trim_end_matches('0').len()
    } else {
        fraction.len() - significant.len()
    };

    Some((fraction.len() as i64 - trailing_zeros as i64).saturating_sub(exponent))
}

fn exact(value: Decimal, raw: &str) -> Result<Amount, LedgerError> {
    let too_precise = || LedgerError::invalid_amount(raw, "at most 4 fractional digits are allowed");

    if written_scale(raw.trim()).is_some_and(|scale| scale > i64::from(SCALE)) {
        return Err(too_precise());
    }

    let rounded = Amount::round(value);
    if rounded.0 != value {
        return Err(too_precise());
    }
    Ok(rounded)
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Amounts serialize as exact JSON numbers, trailing zeros dropped
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let number = serde_json::Number::from_str(&self.0.normalize().to_string())
            .map_err(S::Error::custom)?;
        number.serialize(serializer)
    }
}

/// Unvalidated numeric input handed to the engine
///
/// Callers pass either the text they received or a float they already parsed;
/// the engine decides what is acceptable.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAmount {
    Text(String),
    Number(f64),
}

impl RawAmount {
    /// Convert to an [`Amount`], rejecting more than 4 fractional digits
    pub fn to_exact(&self) -> Result<Amount, LedgerError> {
        match self {
            RawAmount::Text(text) => Amount::parse_exact(text),
            RawAmount::Number(value) => Amount::from_f64_exact(*value),
        }
    }

    /// Convert to an [`Amount`], rounding any extra digits
    pub fn to_rounded(&self) -> Result<Amount, LedgerError> {
        match self {
            RawAmount::Text(text) => Amount::parse(text),
            RawAmount::Number(value) => Amount::from_f64(*value),
        }
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

impl From<String> for RawAmount {
    fn from(value: String) -> Self {
        RawAmount::Text(value)
    }
}

impl From<f64> for RawAmount {
    fn from(value: f64) -> Self {
        RawAmount::Number(value)
    }
}

impl From<Amount> for RawAmount {
    fn from(value: Amount) -> Self {
        RawAmount::Text(value.to_string())
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawAmount::Text(text) => f.write_str(text),
            RawAmount::Number(value) => write!(f, "{}", value),
        }
    }
}
