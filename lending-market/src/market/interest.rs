use soroban_sdk::{contracttype, Vec};

use crate::{constants::SECONDS_PER_YEAR, errors::LendingError, math::Decimal};

/// A piecewise-linear mapping from reserve utilization to borrow APR
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct InterestRateCurve {
    pub utilization_pct: Vec<u32>, // control point utilizations, strictly increasing in [0, 100]
    pub apr_bps: Vec<u64>,         // the APR at each control point in basis points
}

impl InterestRateCurve {
    /// Require the control points describe a valid curve
    ///
    /// ### Errors
    /// If the curve is empty, the sequences differ in length, a utilization is above 100,
    /// utilization is not strictly increasing, or APR decreases
    pub fn validate(&self) -> Result<(), LendingError> {
        let len = self.utilization_pct.len();
        if len == 0 || len != self.apr_bps.len() {
            return Err(LendingError::InvalidReserveConfig);
        }
        let mut prev: Option<(u32, u64)> = None;
        for i in 0..len {
            let util = self.utilization_pct.get_unchecked(i);
            let apr = self.apr_bps.get_unchecked(i);
            if util > 100 {
                return Err(LendingError::InvalidReserveConfig);
            }
            if let Some((prev_util, prev_apr)) = prev {
                if util <= prev_util || apr < prev_apr {
                    return Err(LendingError::InvalidReserveConfig);
                }
            }
            prev = Some((util, apr));
        }
        Ok(())
    }

    /// Fetch the APR for a utilization rate by interpolating between the bracketing
    /// control points. Utilization outside the curve is clamped to the first or last point.
    ///
    /// ### Arguments
    /// * `utilization` - The utilization rate of the reserve, where 1.0 is fully utilized
    pub fn apr(&self, utilization: Decimal) -> Result<Decimal, LendingError> {
        let len = self.utilization_pct.len();
        if len == 0 || len != self.apr_bps.len() {
            return Err(LendingError::InvalidReserveConfig);
        }

        let mut util_lo = Decimal::from_percent(self.utilization_pct.get_unchecked(0));
        let mut apr_lo = Decimal::from_bps(self.apr_bps.get_unchecked(0));
        if utilization <= util_lo {
            return Ok(apr_lo);
        }

        for i in 1..len {
            let util_hi = Decimal::from_percent(self.utilization_pct.get_unchecked(i));
            let apr_hi = Decimal::from_bps(self.apr_bps.get_unchecked(i));
            if utilization <= util_hi {
                let progress = utilization
                    .try_sub(util_lo)?
                    .try_div(util_hi.try_sub(util_lo)?)?;
                let slope = apr_hi.try_sub(apr_lo)?;
                return apr_lo.try_add(slope.try_mul(progress)?);
            }
            util_lo = util_hi;
            apr_lo = apr_hi;
        }
        Ok(apr_lo)
    }
}

/// Calculates the borrow accrual factor for a reserve between two timestamps. The factor is
/// a first order approximation of compounding, `1 + apr * elapsed / SECONDS_PER_YEAR`.
///
/// ### Arguments
/// * `curve` - The interest rate curve of the reserve
/// * `utilization` - The current utilization of the reserve
/// * `last_time` - The last time interest was accrued
/// * `now` - The current timestamp
///
/// ### Errors
/// If `now` is before `last_time`
pub fn calc_accrual(
    curve: &InterestRateCurve,
    utilization: Decimal,
    last_time: u64,
    now: u64,
) -> Result<Decimal, LendingError> {
    let elapsed = now
        .checked_sub(last_time)
        .ok_or(LendingError::ArithmeticUnderflow)?;
    if elapsed == 0 {
        return Ok(Decimal::one());
    }
    let apr = curve.apr(utilization)?;
    let period_rate = apr
        .try_mul(Decimal::from(elapsed))?
        .try_div(Decimal::from(SECONDS_PER_YEAR))?;
    Decimal::one().try_add(period_rate)
}
