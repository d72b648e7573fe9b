//! Currency amounts in the smallest unit.
//!
//! Amounts are unsigned integers; arithmetic that can overflow goes through
//! the checked helpers so callers decide how to surface the failure.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Convert a signed wire amount, rejecting zero and negatives.
    pub fn from_positive(raw: i64) -> Result<Self, TypesError> {
        if raw <= 0 {
            return Err(TypesError::NonPositiveAmount(raw));
        }
        Ok(Self(raw as u64))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// `floor(self * per_mille / 1000)` without intermediate overflow.
    pub fn per_mille(self, per_mille: u64) -> Self {
        let scaled = (self.0 as u128 * per_mille as u128) / 1000;
        Self(scaled.min(u64::MAX as u128) as u64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}
