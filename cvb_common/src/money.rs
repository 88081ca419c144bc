use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Sub},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const CURRENCY_CODE: &str = "EGP";
pub const CURRENCY_CODE_LOWER: &str = "egp";

//--------------------------------------       Money        ----------------------------------------------------------
/// An amount of money in minor currency units (piastres). All prices and transaction amounts in the system are
/// carried as `Money` so that the gateway-facing two-decimal string can be produced without any floating point
/// rounding.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in piastres: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {CURRENCY_CODE}", self.to_decimal_string())
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_pounds(pounds: i64) -> Self {
        Self(pounds * 100)
    }

    /// The amount formatted with exactly two decimal places, e.g. `49.00`. This is the only format the gateway
    /// accepts in the signed order message.
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}
