//! LNO coin amounts.
//!
//! Balances are integers in the smallest on-chain unit; one LNO is
//! [`DECIMALS`] units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

use crate::dec::Dec;

/// Smallest units per LNO.
pub const DECIMALS: i64 = 100_000;

/// Amount of LNO in smallest units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub amount: i128,
}

impl Coin {
    pub const fn new(amount: i128) -> Self {
        Self { amount }
    }

    pub const fn zero() -> Self {
        Self { amount: 0 }
    }

    /// Whole LNO.
    pub fn from_lno(lno: i64) -> Self {
        Self::new(lno as i128 * DECIMALS as i128)
    }

    /// Convert an LNO-denominated decimal price into coins.
    ///
    /// This is the one place where a decimal is rounded to the nearest unit
    /// (ties to even) instead of being carried at full precision. `None` if
    /// the price does not fit a coin amount.
    pub fn from_dec_rounded(lno: Dec) -> Option<Self> {
        lno.checked_mul(Dec::from_int(DECIMALS))?
            .round_to_int()
            .map(Self::new)
    }

    /// The amount as a whole-unit decimal.
    pub fn to_dec(self) -> Dec {
        Dec::from_i128(self.amount)
    }

    pub fn amount(&self) -> i128 {
        self.amount
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }
}

impl Add for Coin {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.amount.saturating_add(other.amount))
    }
}

impl Sub for Coin {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.amount.saturating_sub(other.amount))
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = DECIMALS as i128;
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.abs();
        write!(f, "{sign}{}.{:05} LNO", abs / units, abs % units)
    }
}
