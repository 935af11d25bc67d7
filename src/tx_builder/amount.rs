//! Exact decimal amounts and minimal-unit conversion
//!
//! Amounts are parsed from their decimal text and scaled with integer
//! arithmetic, so `1.5` of a 6-decimal mint is exactly `1_500_000` base units.
//! Digits past the asset's precision are rounded half away from zero.

use crate::errors::TransferError;
use std::fmt;
use std::str::FromStr;

/// Lamports per SOL exponent
pub const NATIVE_DECIMALS: u8 = 9;

/// A strictly positive decimal amount kept as its digits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecimalAmount {
    /// Integer digits without leading zeros (empty for zero)
    integer: String,
    /// Fraction digits without trailing zeros
    fraction: String,
}

impl DecimalAmount {
    /// Convert to base units of an asset with `decimals` decimal places
    pub fn to_minimal_units(&self, decimals: u8) -> Result<u64, TransferError> {
        let overflow = || {
            TransferError::Validation(format!(
                "amount {} overflows the base unit range for {} decimals",
                self, decimals
            ))
        };

        let decimals = decimals as usize;
        let scale = 10u128.checked_pow(decimals as u32).ok_or_else(overflow)?;

        let integer = if self.integer.is_empty() {
            0
        } else {
            self.integer.parse::<u128>().map_err(|_| overflow())?
        };

        let kept_len = self.fraction.len().min(decimals);
        let (kept, dropped) = self.fraction.split_at(kept_len);
        let kept_value = if kept.is_empty() {
            0
        } else {
            kept.parse::<u128>().map_err(|_| overflow())?
        };
        let padding = 10u128
            .checked_pow((decimals - kept_len) as u32)
            .ok_or_else(overflow)?;
        let round_up = dropped.as_bytes().first().is_some_and(|d| *d >= b'5');

        let total = integer
            .checked_mul(scale)
            .and_then(|v| v.checked_add(kept_value.checked_mul(padding)?))
            .and_then(|v| v.checked_add(u128::from(round_up)))
            .ok_or_else(overflow)?;

        if total == 0 {
            return Err(TransferError::Validation(format!(
                "amount {} is smaller than one base unit at {} decimals",
                self, decimals
            )));
        }

        u64::try_from(total).map_err(|_| overflow())
    }
}

impl FromStr for DecimalAmount {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = |reason: &str| {
            TransferError::Validation(format!("invalid amount '{}': {}", raw, reason))
        };

        if raw.is_empty() {
            return Err(invalid("empty"));
        }

        let (integer, fraction) = raw.split_once('.').unwrap_or((raw, ""));
        if integer.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits"));
        }
        if !integer.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("expected a plain positive decimal number"));
        }

        let integer = integer.trim_start_matches('0').to_string();
        let fraction = fraction.trim_end_matches('0').to_string();
        if integer.is_empty() && fraction.bytes().all(|b| b == b'0') {
            return Err(invalid("must be greater than zero"));
        }

        Ok(Self { integer, fraction })
    }
}

impl fmt::Display for DecimalAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let integer = if self.integer.is_empty() { "0" } else { &self.integer };
        if self.fraction.is_empty() {
            write!(f, "{}", integer)
        } else {
            write!(f, "{}.{}", integer, self.fraction)
        }
    }
}
