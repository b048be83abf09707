//! Amount types for the two currencies the engine moves.
//!
//! Fees are paid in both the network's native currency (microalgos) and the
//! oracle token. Both are whole units in a `u64`; all arithmetic is checked.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Native-currency amount in microalgos.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AlgoAmount(u64);

impl AlgoAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u64) -> Self {
        Self(raw)
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

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for AlgoAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} µALGO", self.0)
    }
}

/// Oracle token amount in base units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GoraAmount(u64);

impl GoraAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u64) -> Self {
        Self(raw)
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

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for GoraAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} GORA", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_sub_underflow_is_none() {
        assert_eq!(AlgoAmount::new(5).checked_sub(AlgoAmount::new(6)), None);
        assert_eq!(GoraAmount::new(5).checked_sub(GoraAmount::new(6)), None);
    }

    #[test]
    fn checked_add_overflow_is_none() {
        assert_eq!(AlgoAmount::new(u64::MAX).checked_add(AlgoAmount::new(1)), None);
    }

    #[test]
    fn display_units() {
        assert_eq!(GoraAmount::new(7).to_string(), "7 GORA");
        assert_eq!(AlgoAmount::new(7).to_string(), "7 µALGO");
    }
}
