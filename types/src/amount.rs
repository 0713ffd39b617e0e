//! Reward token amounts.
//!
//! Ledger amounts are fixed-point integers (uint256) with 18 fractional
//! decimal digits. Conversion to a human-readable decimal is done by integer
//! scaling so that no precision is lost.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::U256;

/// A token amount in base units (1 token = 10^18 base units).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(U256);

impl TokenAmount {
    /// Number of fractional decimal digits.
    pub const DECIMALS: usize = 18;
    pub const ZERO: Self = Self(U256([0; 4]));

    pub fn from_base_units(raw: U256) -> Self {
        Self(raw)
    }

    /// Whole tokens, e.g. `whole(10)` is `10 * 10^18` base units.
    pub fn whole(tokens: u64) -> Self {
        Self(U256::from(tokens) * U256::exp10(Self::DECIMALS))
    }

    pub fn base_units(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Exact decimal rendering with trailing fractional zeros removed.
    pub fn to_decimal_string(&self) -> String {
        let digits = self.0.to_string();
        let padded = if digits.len() <= Self::DECIMALS {
            format!("{digits:0>width$}", width = Self::DECIMALS + 1)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - Self::DECIMALS);
        let frac = frac_part.trim_end_matches('0');
        if frac.is_empty() {
            int_part.to_string()
        } else {
            format!("{int_part}.{frac}")
        }
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

/// Serialized as a decimal string so JSON consumers never see a rounded float.
impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}
