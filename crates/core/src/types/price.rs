//! Type-safe price representation using decimal arithmetic.
//!
//! Catalog and cart records carry prices as JSON numbers. Totals are computed
//! on [`Price`] so that summing many line items does not accumulate binary
//! floating point error.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price in the store currency (US dollars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Convert a JSON number into a price.
    ///
    /// Returns `None` for NaN and infinities.
    #[must_use]
    pub fn from_f64(amount: f64) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        Decimal::from_f64(amount).map(Self)
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Format for display with two decimal places (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        let mut rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        if rounded.is_sign_negative() {
            format!("-${}", rounded.abs())
        } else {
            format!("${rounded}")
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.display())
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f64() {
        assert_eq!(Price::from_f64(9.99).unwrap().display(), "$9.99");
        assert!(Price::from_f64(f64::NAN).is_none());
        assert!(Price::from_f64(f64::INFINITY).is_none());
    }

    #[test]
    fn test_display_pads_and_rounds() {
        assert_eq!(Price::from_f64(9.9).unwrap().display(), "$9.90");
        assert_eq!(Price::from_f64(0.125).unwrap().display(), "$0.13");
        assert_eq!(Price::ZERO.display(), "$0.00");
        assert_eq!(Price::from_f64(-1.5).unwrap().display(), "-$1.50");
        assert_eq!(format!("{:>8}", Price::ZERO), "   $0.00");
    }

    #[test]
    fn test_line_totals_sum_exactly() {
        let unit = Price::from_f64(0.1).unwrap();
        let total: Price = std::iter::repeat_n(unit, 3).map(|p| p * 1).sum();
        assert_eq!(total.display(), "$0.30");
        assert_eq!((unit * 3).amount(), Decimal::new(3, 1));
    }
}
