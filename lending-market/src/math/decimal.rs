//! WAD scaled fixed-point numbers used for all market accounting.

#![allow(clippy::assign_op_pattern)]
#![allow(clippy::ptr_offset_with_cast)]
#![allow(clippy::manual_range_contains)]

use core::fmt;

use soroban_sdk::contracttype;
use uint::construct_uint;

use crate::{constants::WAD, errors::LendingError};

construct_uint! {
    /// 256-bit intermediate for WAD multiplication and division
    pub struct U256(4);
}

/// An unsigned fixed-point number scaled by 10^18
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord)]
#[contracttype]
pub struct Decimal(pub u128);

impl Decimal {
    pub const fn zero() -> Self {
        Decimal(0)
    }

    pub const fn one() -> Self {
        Decimal(WAD)
    }

    /// Create a decimal from an already WAD scaled value
    pub const fn from_scaled_val(scaled_val: u128) -> Self {
        Decimal(scaled_val)
    }

    /// Return the raw WAD scaled value
    pub const fn to_scaled_val(&self) -> u128 {
        self.0
    }

    /// Create a decimal from a percentage, e.g. 50 => 0.5
    pub fn from_percent(percent: u32) -> Self {
        Decimal(percent as u128 * WAD / 100)
    }

    /// Create a decimal from basis points, e.g. 250 => 0.025
    pub fn from_bps(bps: u64) -> Self {
        Decimal(bps as u128 * WAD / 10_000)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn try_add(self, rhs: Decimal) -> Result<Decimal, LendingError> {
        self.0
            .checked_add(rhs.0)
            .map(Decimal)
            .ok_or(LendingError::ArithmeticOverflow)
    }

    /// ### Errors
    /// If `rhs` is larger than `self`
    pub fn try_sub(self, rhs: Decimal) -> Result<Decimal, LendingError> {
        self.0
            .checked_sub(rhs.0)
            .map(Decimal)
            .ok_or(LendingError::ArithmeticUnderflow)
    }

    /// Subtract `rhs`, clamping at zero
    pub fn saturating_sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0.saturating_sub(rhs.0))
    }

    /// Compute `self * rhs / WAD` with a 256-bit intermediate, rounding down
    pub fn try_mul(self, rhs: Decimal) -> Result<Decimal, LendingError> {
        let product = U256::from(self.0) * U256::from(rhs.0) / U256::from(WAD);
        to_u128(product).map(Decimal)
    }

    /// Compute `self * WAD / rhs` with a 256-bit intermediate, rounding down
    ///
    /// ### Errors
    /// If `rhs` is zero
    pub fn try_div(self, rhs: Decimal) -> Result<Decimal, LendingError> {
        if rhs.0 == 0 {
            return Err(LendingError::DivisionByZero);
        }
        let quotient = U256::from(self.0) * U256::from(WAD) / U256::from(rhs.0);
        to_u128(quotient).map(Decimal)
    }

    /// Truncate the fractional part and return the integer
    pub fn try_floor_u64(&self) -> Result<u64, LendingError> {
        u64::try_from(self.0 / WAD).map_err(|_| LendingError::ArithmeticOverflow)
    }

    /// Round any fractional part up and return the integer
    pub fn try_ceil_u64(&self) -> Result<u64, LendingError> {
        let mut integer = self.0 / WAD;
        if self.0 % WAD != 0 {
            integer += 1;
        }
        u64::try_from(integer).map_err(|_| LendingError::ArithmeticOverflow)
    }
}

fn to_u128(value: U256) -> Result<u128, LendingError> {
    if value > U256::from(u128::MAX) {
        return Err(LendingError::ArithmeticOverflow);
    }
    Ok(value.low_u128())
}

impl From<u64> for Decimal {
    fn from(val: u64) -> Self {
        // u64::MAX * WAD fits within u128
        Decimal(val as u128 * WAD)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:018}", self.0 / WAD, self.0 % WAD)
    }
}
