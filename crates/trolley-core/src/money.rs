//! # Money
//!
//! Amounts are whole cents in an `i64`. Repricing after every cart mutation
//! must not drift, so nothing here ever goes through `f64`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line charges, subtotal         exact cent sums                         │
//! │  bulk 10% then loyalty 2%       exact i128 product of retained bps      │
//! │  total                          one round-half-even to the cent         │
//! │                                                                         │
//! │    22.00 × 0.90 × 0.98 = 19.404  ──►  19.40                             │
//! │    25.00 × 0.90 × 0.98 = 22.05   ──►  22.05                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Boundary Format
//! At the serialization boundary money is a fixed-point string with two
//! fractional digits (`"19.40"`), never a JSON number.
//!
//! ```rust
//! use trolley_core::money::Money;
//!
//! let price: Money = "10.5".parse().unwrap();
//! assert_eq!(price.cents(), 1050);
//! assert_eq!(price.to_string(), "10.50");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::DiscountRate;

/// Minor units per major unit (cents per dollar).
const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// An amount of money in cents.
///
/// Signed, so a discount can be written as `subtotal - total`. Serializes
/// as `"10.99"`.
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► PricingLine.unit_price ──► LineCharge.charged_price │
/// │                                                      │                  │
/// │                                                      ▼                  │
/// │                            CartPricing.subtotal ──► bulk ──► loyalty    │
/// │                                                      │                  │
/// │                                                      ▼                  │
/// │                                             CartPricing.total           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Wraps a cent count.
    ///
    /// ```rust
    /// use trolley_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole units, truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Cents past the whole units, 0 through 99.
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Unit price times quantity.
    ///
    /// ```rust
    /// use trolley_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Applies percentage discounts one after another and rounds once.
    ///
    /// Each rate multiplies the running total by `(10000 - bps) / 10000`.
    /// The intermediate value is carried exactly in `i128`, so
    /// `19.80 × 0.98 = 19.404` is only rounded when the final cent value
    /// is produced. Rounding is half to even.
    ///
    /// ```rust
    /// use trolley_core::money::Money;
    /// use trolley_core::types::DiscountRate;
    ///
    /// let subtotal = Money::from_cents(2200);
    /// let total = subtotal.apply_discounts(&[
    ///     DiscountRate::from_bps(1000), // bulk 10%
    ///     DiscountRate::from_bps(200),  // loyalty 2%
    /// ]);
    /// assert_eq!(total.cents(), 1940); // 19.404 → 19.40
    /// ```
    pub fn apply_discounts(&self, rates: &[DiscountRate]) -> Money {
        let mut numerator = i128::from(self.0);
        let mut denominator: i128 = 1;

        for rate in rates {
            numerator *= i128::from(rate.retained_bps());
            denominator *= i128::from(DiscountRate::FULL_BPS);
        }

        Money(round_half_even(numerator, denominator) as i64)
    }
}

/// Divides `numerator` by a positive `denominator`, rounding half to even.
fn round_half_even(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator.div_euclid(denominator);
    let twice_remainder = numerator.rem_euclid(denominator) * 2;

    if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Fixed-point rendering with two fractional digits: `10.99`, `-5.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

/// Parses `"10"`, `"10.5"`, `"10.50"` or `"-5.50"`.
///
/// More than two fractional digits is rejected rather than rounded:
/// the boundary format is exact.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (major_str, minor_str) = match unsigned.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (unsigned, ""),
        };

        if major_str.is_empty() || !major_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected a decimal number like 10.99"));
        }
        if minor_str.len() > 2 || !minor_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("at most two fractional digits are allowed"));
        }

        let major: i64 = major_str
            .parse()
            .map_err(|_| invalid("amount is too large"))?;
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| invalid("bad fraction"))? * 10,
            _ => minor_str.parse().map_err(|_| invalid("bad fraction"))?,
        };

        let cents = major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("amount is too large"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_parse() {
        assert_eq!("10.99".parse::<Money>().unwrap().cents(), 1099);
        assert_eq!("10.5".parse::<Money>().unwrap().cents(), 1050);
        assert_eq!("20".parse::<Money>().unwrap().cents(), 2000);
        assert_eq!("-0.05".parse::<Money>().unwrap().cents(), -5);
        assert_eq!(" 4.00 ".parse::<Money>().unwrap().cents(), 400);

        assert!("".parse::<Money>().is_err());
        assert!(".50".parse::<Money>().is_err());
        assert!("10.999".parse::<Money>().is_err());
        assert!("1e3".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("99999999999999999999".parse::<Money>().is_err());
    }

    #[test]
    fn test_serde_uses_fixed_point_strings() {
        let json = serde_json::to_string(&Money::from_cents(1940)).unwrap();
        assert_eq!(json, "\"19.40\"");

        let back: Money = serde_json::from_str("\"2.00\"").unwrap();
        assert_eq!(back, Money::from_cents(200));

        // Floats are not accepted at the boundary
        assert!(serde_json::from_str::<Money>("19.4").is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply_quantity(3).cents(), 3000);

        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_apply_discounts_rounds_once() {
        // 20.01 × 0.90 = 18.009 → 18.01
        let bulk = DiscountRate::from_bps(1000);
        assert_eq!(Money::from_cents(2001).apply_discounts(&[bulk]).cents(), 1801);

        // 25.00 × 0.90 × 0.98 = 22.05 exactly
        let loyalty = DiscountRate::from_bps(200);
        assert_eq!(
            Money::from_cents(2500)
                .apply_discounts(&[bulk, loyalty])
                .cents(),
            2205
        );

        // No rates leaves the value untouched
        assert_eq!(Money::from_cents(1234).apply_discounts(&[]).cents(), 1234);
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(5, 10), 0); // 0.5 → 0
        assert_eq!(round_half_even(15, 10), 2); // 1.5 → 2
        assert_eq!(round_half_even(25, 10), 2); // 2.5 → 2
        assert_eq!(round_half_even(26, 10), 3);
        assert_eq!(round_half_even(-25, 10), -2);
        assert_eq!(round_half_even(-26, 10), -3);
    }
}
