use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

/// Unsigned balance in asset base units, arbitrary precision.
///
/// There is no `Sub` impl: every debit goes through `checked_sub` so that a
/// negative balance can never be represented.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Balance(BigUint);

impl Balance {
    pub fn zero() -> Self {
        Balance(BigUint::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Balance(BigUint::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_sub(&self, other: &Balance) -> Option<Balance> {
        if self.0 >= other.0 {
            Some(Balance(&self.0 - &other.0))
        } else {
            None
        }
    }

    pub fn saturating_sub(&self, other: &Balance) -> Balance {
        self.checked_sub(other).unwrap_or_else(Balance::zero)
    }

    /// `floor(self * numerator / denominator)`, exact integer arithmetic.
    /// Returns zero when the denominator is zero.
    pub fn mul_div_floor(&self, numerator: &Balance, denominator: &Balance) -> Balance {
        if denominator.is_zero() {
            return Balance::zero();
        }
        Balance((&self.0 * &numerator.0) / &denominator.0)
    }

    /// Splits the balance into `parts` equal shares, returning the share and
    /// the integer-division remainder.
    pub fn split(&self, parts: usize) -> (Balance, Balance) {
        if parts == 0 {
            return (Balance::zero(), self.clone());
        }
        let divisor = BigUint::from(parts);
        (Balance(&self.0 / &divisor), Balance(&self.0 % &divisor))
    }

    pub fn to_signed(&self) -> BigInt {
        BigInt::from(self.0.clone())
    }

    /// Big-endian magnitude, used for hashing.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }
}

impl From<u64> for Balance {
    fn from(value: u64) -> Self {
        Balance::from_u64(value)
    }
}

impl Add for Balance {
    type Output = Balance;
    fn add(self, other: Balance) -> Balance {
        Balance(self.0 + other.0)
    }
}

impl<'a> Add<&'a Balance> for &'a Balance {
    type Output = Balance;
    fn add(self, other: &'a Balance) -> Balance {
        Balance(&self.0 + &other.0)
    }
}

impl AddAssign<&Balance> for Balance {
    fn add_assign(&mut self, other: &Balance) {
        self.0 += &other.0;
    }
}

impl Mul<u64> for &Balance {
    type Output = Balance;
    fn mul(self, factor: u64) -> Balance {
        Balance(&self.0 * BigUint::from(factor))
    }
}

impl<'a> Sum<&'a Balance> for Balance {
    fn sum<I: Iterator<Item = &'a Balance>>(iter: I) -> Balance {
        iter.fold(Balance::zero(), |acc, b| &acc + b)
    }
}

impl Sum for Balance {
    fn sum<I: Iterator<Item = Balance>>(iter: I) -> Balance {
        iter.fold(Balance::zero(), |acc, b| acc + b)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
