//! Fixed-point decimal with 38 digits of precision and a scale of 12.

use crate::storage::error::{StorageError, StorageResult};
use std::fmt;
use std::str::FromStr;

/// Maximum number of significant digits a decimal may hold.
pub const MAX_DECIMAL_PRECISION: usize = 38;
/// Number of digits kept after the radix point.
pub const MAX_DECIMAL_SCALE: usize = 12;

const SCALE_FACTOR: i128 = 1_000_000_000_000;
const MAX_UNSCALED: i128 = 99_999_999_999_999_999_999_999_999_999_999_999_999;

/// Decimal stored as an unscaled 128-bit integer (`value * 10^12`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(i128);

impl Decimal {
    pub const ZERO: Decimal = Decimal(0);

    /// Build a decimal from its unscaled representation.
    pub fn from_unscaled(unscaled: i128) -> StorageResult<Self> {
        if !(-MAX_UNSCALED..=MAX_UNSCALED).contains(&unscaled) {
            return Err(StorageError::InvalidDecimal(format!(
                "unscaled value {} exceeds {} digits of precision",
                unscaled, MAX_DECIMAL_PRECISION
            )));
        }
        Ok(Decimal(unscaled))
    }

    /// Slot and wire decoding path. The caller has already ruled out the
    /// null sentinel.
    pub(crate) fn from_unscaled_unchecked(unscaled: i128) -> Self {
        Decimal(unscaled)
    }

    pub fn unscaled(&self) -> i128 {
        self.0
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(value as i128 * SCALE_FACTOR)
    }

    pub fn from_f64(value: f64) -> StorageResult<Self> {
        if !value.is_finite() {
            return Err(StorageError::InvalidDecimal(value.to_string()));
        }
        let scaled = (value * SCALE_FACTOR as f64).round();
        if scaled.abs() > MAX_UNSCALED as f64 {
            return Err(StorageError::InvalidDecimal(value.to_string()));
        }
        Decimal::from_unscaled(scaled as i128)
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / SCALE_FACTOR as f64
    }

    /// True when there is no fractional part.
    pub fn is_integral(&self) -> bool {
        self.0 % SCALE_FACTOR == 0
    }

    /// Integer part, truncated toward zero. `None` if it does not fit.
    pub fn trunc_to_i64(&self) -> Option<i64> {
        i64::try_from(self.0 / SCALE_FACTOR).ok()
    }
}

impl FromStr for Decimal {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidDecimal(s.to_string());
        let trimmed = s.trim();

        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > MAX_DECIMAL_SCALE
            || whole.trim_start_matches('0').len() > MAX_DECIMAL_PRECISION - MAX_DECIMAL_SCALE
        {
            return Err(invalid());
        }

        let whole_value: i128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut fraction_value: i128 = if fraction.is_empty() {
            0
        } else {
            fraction.parse().map_err(|_| invalid())?
        };
        for _ in fraction.len()..MAX_DECIMAL_SCALE {
            fraction_value *= 10;
        }

        let unscaled = whole_value * SCALE_FACTOR + fraction_value;
        Decimal::from_unscaled(if negative { -unscaled } else { unscaled })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let scale = SCALE_FACTOR as u128;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            magnitude / scale,
            magnitude % scale,
            width = MAX_DECIMAL_SCALE
        )
    }
}
