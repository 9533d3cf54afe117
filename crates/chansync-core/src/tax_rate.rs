//! # Tax Rate Module
//!
//! Provides the `TaxRate` type used to match external tax descriptors against
//! configured tax mappings.
//!
//! ## Why Fixed-Point?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE ROUNDING MISMATCH PROBLEM                                          │
//! │                                                                         │
//! │  Channel sends:        "rate": 0.2                                      │
//! │  Mapping stored as:    0.20000000000000001 (f64)                        │
//! │  Equality check:       0.2 == 0.20000000000000001  ❌ maybe, maybe not  │
//! │                                                                         │
//! │  OUR SOLUTION: exact decimals, 14 total digits, 10 of them fractional   │
//! │    "0.2"  → 2_000_000_000 units                                        │
//! │    "0.20" → 2_000_000_000 units   ✅ exact match, stored as INTEGER     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Number of fractional digits kept.
pub const TAX_RATE_SCALE: u32 = 10;

/// Total number of significant digits kept.
pub const TAX_RATE_PRECISION: u32 = 14;

const UNITS_PER_ONE: i64 = 10_i64.pow(TAX_RATE_SCALE);
const MAX_UNITS: i64 = 10_i64.pow(TAX_RATE_PRECISION) - 1;

// =============================================================================
// Tax Rate
// =============================================================================

/// A tax rate as a fraction (0.20 = 20%), held as an integer count of
/// 10^-10 units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct TaxRate(i64);

impl TaxRate {
    /// Creates a rate from raw 10^-10 units.
    ///
    /// ## Example
    /// ```rust
    /// use chansync_core::tax_rate::TaxRate;
    ///
    /// let rate = TaxRate::from_units(2_000_000_000).unwrap();
    /// assert_eq!(rate.to_string(), "0.20");
    /// ```
    pub fn from_units(units: i64) -> Result<Self, ValidationError> {
        if units.abs() > MAX_UNITS {
            return Err(out_of_range());
        }
        Ok(TaxRate(units))
    }

    /// Creates a rate from an exact decimal.
    ///
    /// ## Errors
    /// * `InvalidFormat` - more than 10 significant fractional digits
    /// * `OutOfRange` - more than 4 integer digits
    pub fn from_decimal(value: Decimal) -> Result<Self, ValidationError> {
        let value = value.normalize();
        if value.scale() > TAX_RATE_SCALE {
            return Err(invalid("at most 10 fractional digits are significant"));
        }
        let units = value
            .checked_mul(Decimal::from(UNITS_PER_ONE))
            .and_then(|units| units.to_i64())
            .ok_or_else(out_of_range)?;
        TaxRate::from_units(units)
    }

    /// Creates a rate from a float, rounding to 10 fractional digits.
    ///
    /// Only for adapters whose channel sends JSON numbers. Prefer parsing the
    /// textual form whenever the channel provides one.
    pub fn from_f64(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(invalid("must be a finite number"));
        }
        let value = Decimal::from_f64(value).ok_or_else(out_of_range)?;
        TaxRate::from_decimal(value.round_dp(TAX_RATE_SCALE))
    }

    /// Returns the raw 10^-10 units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// The rate as an exact decimal, trailing zeros removed.
    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(self.0, TAX_RATE_SCALE).normalize()
    }
}

fn out_of_range() -> ValidationError {
    ValidationError::OutOfRange {
        field: "tax_rate".to_string(),
        min: -9999,
        max: 9999,
    }
}

fn invalid(reason: &str) -> ValidationError {
    ValidationError::InvalidFormat {
        field: "tax_rate".to_string(),
        reason: reason.to_string(),
    }
}

impl FromStr for TaxRate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value =
            Decimal::from_str_exact(s.trim()).map_err(|_| invalid("must be a decimal number"))?;
        TaxRate::from_decimal(value)
    }
}

impl fmt::Display for TaxRate {
    /// Formats with at least two fractional digits: `0.20`, `0.0825`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.as_decimal();
        if value.scale() < 2 {
            value.rescale(2);
        }
        write!(f, "{value}")
    }
}

impl Serialize for TaxRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TaxRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(f64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Number(n) => TaxRate::from_f64(n).map_err(serde::de::Error::custom),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_equal_representations() {
        let a: TaxRate = "0.2".parse().unwrap();
        let b: TaxRate = "0.20".parse().unwrap();
        let c: TaxRate = "0.200000000000".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.units(), 2_000_000_000);
    }

    #[test]
    fn test_parse_rejects_noise() {
        assert!("".parse::<TaxRate>().is_err());
        assert!("abc".parse::<TaxRate>().is_err());
        assert!("0.2x".parse::<TaxRate>().is_err());
        assert!("0.00000000001".parse::<TaxRate>().is_err());
        assert!("12345.0".parse::<TaxRate>().is_err());
    }

    #[test]
    fn test_display_keeps_two_digits() {
        assert_eq!("0.2".parse::<TaxRate>().unwrap().to_string(), "0.20");
        assert_eq!("0.0825".parse::<TaxRate>().unwrap().to_string(), "0.0825");
        assert_eq!("1".parse::<TaxRate>().unwrap().to_string(), "1.00");
        assert_eq!("-0.05".parse::<TaxRate>().unwrap().to_string(), "-0.05");
    }

    #[test]
    fn test_decimal_round_trip() {
        let rate: TaxRate = "0.0825".parse().unwrap();
        assert_eq!(rate.as_decimal(), Decimal::new(825, 4));
        assert_eq!(TaxRate::from_decimal(Decimal::new(2000, 4)).unwrap().units(), 2_000_000_000);
        assert!(TaxRate::from_decimal(Decimal::MAX).is_err());
        assert!(TaxRate::from_f64(f64::NAN).is_err());
    }

    #[test]
    fn test_from_f64_matches_text() {
        let from_float = TaxRate::from_f64(0.2).unwrap();
        let from_text: TaxRate = "0.20".parse().unwrap();
        assert_eq!(from_float, from_text);
    }

    #[test]
    fn test_serde_accepts_string_and_number() {
        let text: TaxRate = serde_json::from_str("\"0.19\"").unwrap();
        let number: TaxRate = serde_json::from_str("0.19").unwrap();
        assert_eq!(text, number);
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"0.19\"");
    }
}
