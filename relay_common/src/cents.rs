use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// The largest magnitude (in cents) that survives a round trip through an `f64` without losing precision.
const MAX_EXACT_CENTS: f64 = 9_007_199_254_740_991.0;

//--------------------------------------        Cents        ---------------------------------------------------------
/// A monetary amount with two implied decimal places.
///
/// Amounts arrive on the wire as JSON numbers (`19.9`), but are stored and summed as whole cents so that the totals in
/// the payments summary are exact.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "f64", into = "f64")]
pub struct Cents(i64);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<f64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(CentsConversionError(format!("{value} is not a finite number")));
        }
        let cents = (value * 100.0).round();
        if cents.abs() > MAX_EXACT_CENTS {
            return Err(CentsConversionError(format!("{value} is too large")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }
}

impl From<Cents> for f64 {
    fn from(value: Cents) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let v = value.0 as f64;
        v / 100.0
    }
}

impl Add for Cents {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
