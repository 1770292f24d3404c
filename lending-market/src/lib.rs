#![no_std]

#[cfg(any(test, feature = "testutils"))]
extern crate std;

mod constants;
mod contract;
mod errors;
mod market;
mod math;
mod storage;

pub mod testutils;

pub use crate::contract::{LendingMarketClient, LendingMarketContract};
pub use crate::errors::LendingError;
pub use crate::market::{
    Borrow, Deposit, InterestRateCurve, LiquidationResult, Obligation, Reserve, ReserveConfig,
    ReserveTreasury,
};
pub use crate::math::Decimal;
pub use crate::storage::MarketConfig;
