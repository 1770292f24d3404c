use cast::i128;
use soroban_fixed_point_math::FixedPoint;
use soroban_sdk::{contracttype, Address, Env};

use crate::{
    constants::{PRICE_STALENESS_THRESHOLD_S, SCALAR_BPS},
    errors::LendingError,
    math::Decimal,
    storage,
};

use super::interest::{calc_accrual, InterestRateCurve};

/// The risk and fee configuration of a reserve
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct ReserveConfig {
    pub open_ltv_pct: u32,          // the share of deposit value that can be borrowed against
    pub close_ltv_pct: u32,         // the share of deposit value where borrows become liquidatable
    pub borrow_weight_bps: u64,     // the risk multiplier applied to borrows of this reserve
    pub deposit_limit: u64,         // the max total supply of the reserve in underlying tokens
    pub borrow_limit: u64,          // the max total debt of the reserve in underlying tokens
    pub liquidation_bonus_pct: u32, // the extra collateral value awarded to liquidators
    pub borrow_fee_bps: u64,        // the origination fee charged on each borrow
    pub spread_fee_bps: u64,        // the share of accrued interest kept by the protocol
    pub liquidation_fee_bps: u64,   // the share of the liquidation bonus kept by the protocol
    pub interest_rate: InterestRateCurve,
}

impl ReserveConfig {
    /// Require the configuration to be internally consistent
    ///
    /// ### Errors
    /// If any field is outside of its allowed range or the interest rate curve is invalid
    pub fn validate(&self) -> Result<(), LendingError> {
        let max_bps = SCALAR_BPS as u64;
        if self.open_ltv_pct > self.close_ltv_pct
            || self.close_ltv_pct > 100
            || self.borrow_weight_bps < max_bps
            || self.liquidation_bonus_pct > 20
            || self.borrow_fee_bps > max_bps
            || self.spread_fee_bps > max_bps
            || self.liquidation_fee_bps > max_bps
        {
            return Err(LendingError::InvalidReserveConfig);
        }
        self.interest_rate.validate()
    }
}

/// A single token liquidity pool within the market
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct Reserve {
    pub index: u32,    // the permanent index of the reserve in the market
    pub asset: Address, // the underlying asset address
    pub config: ReserveConfig,
    pub mint_decimals: u32,                  // the decimals of the underlying asset
    pub price: Decimal,                      // the USD price of one whole underlying token
    pub price_last_update_timestamp: u64,    // the time the price was last updated
    pub available_amount: u64,               // the undeployed liquidity of the reserve
    pub ctoken_supply: u64,                  // the total supply of ctokens
    pub borrowed_amount: Decimal,            // the total debt of the reserve, including interest
    pub cumulative_borrow_rate: Decimal,     // the compounding accumulator of borrow interest
    pub interest_last_update_timestamp: u64, // the time interest was last compounded
    pub fees_accumulated: Decimal,           // the liquidity owed to the protocol
}

impl Reserve {
    /// Create a new, empty reserve
    ///
    /// ### Arguments
    /// * `index` - The permanent index of the reserve
    /// * `asset` - The address of the underlying asset
    /// * `config` - The reserve configuration
    /// * `mint_decimals` - The decimals of the underlying asset
    /// * `price` - The initial USD price of one whole token
    /// * `now` - The current timestamp
    ///
    /// ### Errors
    /// If the configuration is invalid or the decimals are not supported
    pub fn new(
        index: u32,
        asset: Address,
        config: ReserveConfig,
        mint_decimals: u32,
        price: Decimal,
        now: u64,
    ) -> Result<Reserve, LendingError> {
        config.validate()?;
        if 10u64.checked_pow(mint_decimals).is_none() {
            return Err(LendingError::InvalidReserveConfig);
        }
        Ok(Reserve {
            index,
            asset,
            config,
            mint_decimals,
            price,
            price_last_update_timestamp: now,
            available_amount: 0,
            ctoken_supply: 0,
            borrowed_amount: Decimal::zero(),
            cumulative_borrow_rate: Decimal::one(),
            interest_last_update_timestamp: now,
            fees_accumulated: Decimal::zero(),
        })
    }

    /// Load a Reserve from the ledger.
    ///
    /// **NOTE**: This function is not cached, and should be called from the Market.
    ///
    /// ### Errors
    /// If no reserve exists at `index`
    pub fn load(e: &Env, index: u32) -> Result<Reserve, LendingError> {
        storage::get_reserve(e, index).ok_or(LendingError::ReserveNotFound)
    }

    /// Store the updated reserve to the ledger.
    pub fn store(&self, e: &Env) {
        storage::set_reserve(e, self.index, self);
    }

    /********** Valuation **********/

    /// Fetch the cached price
    ///
    /// ### Errors
    /// If the price is older than the staleness threshold
    pub fn price(&self, now: u64) -> Result<Decimal, LendingError> {
        if now.saturating_sub(self.price_last_update_timestamp) > PRICE_STALENESS_THRESHOLD_S {
            return Err(LendingError::StalePrice);
        }
        Ok(self.price)
    }

    /// Fetch the USD value of an amount of underlying tokens
    ///
    /// ### Arguments
    /// * `amount` - The amount of underlying tokens
    /// * `now` - The current timestamp
    pub fn market_value(&self, amount: Decimal, now: u64) -> Result<Decimal, LendingError> {
        self.price(now)?.try_mul(amount)?.try_div(self.scalar())
    }

    /// Fetch the amount of underlying tokens worth a USD value
    ///
    /// ### Arguments
    /// * `value_usd` - The USD value
    /// * `now` - The current timestamp
    pub fn usd_to_token_amount(&self, value_usd: Decimal, now: u64) -> Result<Decimal, LendingError> {
        value_usd.try_mul(self.scalar())?.try_div(self.price(now)?)
    }

    fn scalar(&self) -> Decimal {
        // validated on creation
        Decimal::from(10u64.pow(self.mint_decimals))
    }

    /********** Supply **********/

    /// Fetch the liquidity owned by depositors in underlying tokens
    pub fn total_supply(&self) -> Result<Decimal, LendingError> {
        Decimal::from(self.available_amount)
            .try_add(self.borrowed_amount)?
            .try_sub(self.fees_accumulated)
    }

    /// Fetch the current utilization rate, or zero if the reserve holds no liquidity
    pub fn utilization(&self) -> Result<Decimal, LendingError> {
        let total = Decimal::from(self.available_amount).try_add(self.borrowed_amount)?;
        if total.is_zero() {
            return Ok(Decimal::zero());
        }
        self.borrowed_amount.try_div(total)
    }

    /// Fetch the amount of underlying tokens one ctoken is worth, or one if no ctokens exist
    pub fn ctoken_ratio(&self) -> Result<Decimal, LendingError> {
        if self.ctoken_supply == 0 {
            return Ok(Decimal::one());
        }
        self.total_supply()?
            .try_div(Decimal::from(self.ctoken_supply))
    }

    /// Convert ctokens to the underlying tokens they can be redeemed for
    ///
    /// ### Arguments
    /// * `ctokens` - The amount of ctokens
    pub fn ctokens_to_liquidity(&self, ctokens: u64) -> Result<Decimal, LendingError> {
        Decimal::from(ctokens).try_mul(self.ctoken_ratio()?)
    }

    /// Convert underlying tokens to ctokens, rounding down
    ///
    /// ### Arguments
    /// * `amount` - The amount of underlying tokens
    pub fn liquidity_to_ctokens(&self, amount: Decimal) -> Result<u64, LendingError> {
        amount.try_div(self.ctoken_ratio()?)?.try_floor_u64()
    }

    /********** Interest **********/

    /// Accrue interest on all outstanding debt up to `now`. Does nothing if interest was
    /// already compounded at `now`.
    ///
    /// ### Arguments
    /// * `now` - The current timestamp
    ///
    /// ### Errors
    /// If `now` is before the last update
    pub fn compound_interest(&mut self, now: u64) -> Result<(), LendingError> {
        if now == self.interest_last_update_timestamp {
            return Ok(());
        }
        let factor = calc_accrual(
            &self.config.interest_rate,
            self.utilization()?,
            self.interest_last_update_timestamp,
            now,
        )?;

        let new_borrowed = self.borrowed_amount.try_mul(factor)?;
        let new_cumulative_rate = self.cumulative_borrow_rate.try_mul(factor)?;
        let accrued = new_borrowed.try_sub(self.borrowed_amount)?;
        let spread_fee = accrued.try_mul(Decimal::from_bps(self.config.spread_fee_bps))?;
        let new_fees = self.fees_accumulated.try_add(spread_fee)?;

        self.borrowed_amount = new_borrowed;
        self.cumulative_borrow_rate = new_cumulative_rate;
        self.fees_accumulated = new_fees;
        self.interest_last_update_timestamp = now;
        Ok(())
    }

    /********** Liquidity **********/

    /// Deposit underlying tokens and mint ctokens at the current ratio
    ///
    /// Returns the amount of ctokens minted
    ///
    /// ### Arguments
    /// * `amount` - The amount of underlying tokens deposited
    /// * `now` - The current timestamp
    ///
    /// ### Errors
    /// If the deposit would exceed the deposit limit or mints no ctokens
    pub fn deposit_liquidity_and_mint_ctokens(
        &mut self,
        amount: u64,
        now: u64,
    ) -> Result<u64, LendingError> {
        self.compound_interest(now)?;
        let minted = self.liquidity_to_ctokens(Decimal::from(amount))?;
        if minted == 0 {
            return Err(LendingError::InvalidAmount);
        }

        let new_available = self
            .available_amount
            .checked_add(amount)
            .ok_or(LendingError::ArithmeticOverflow)?;
        let new_supply = self
            .ctoken_supply
            .checked_add(minted)
            .ok_or(LendingError::ArithmeticOverflow)?;
        let total = Decimal::from(new_available).try_add(self.borrowed_amount)?;
        if total > Decimal::from(self.config.deposit_limit) {
            return Err(LendingError::DepositLimitExceeded);
        }

        self.available_amount = new_available;
        self.ctoken_supply = new_supply;
        Ok(minted)
    }

    /// Burn ctokens and release the underlying tokens they are worth
    ///
    /// Returns the amount of underlying tokens released
    ///
    /// ### Arguments
    /// * `ctokens` - The amount of ctokens to burn
    /// * `now` - The current timestamp
    ///
    /// ### Errors
    /// If the reserve does not hold enough undeployed liquidity
    pub fn redeem_ctokens(&mut self, ctokens: u64, now: u64) -> Result<u64, LendingError> {
        self.compound_interest(now)?;
        if ctokens > self.ctoken_supply {
            return Err(LendingError::InsufficientCTokens);
        }
        let liquidity = self.ctokens_to_liquidity(ctokens)?.try_floor_u64()?;
        if liquidity > self.available_amount {
            return Err(LendingError::InsufficientLiquidity);
        }

        self.available_amount -= liquidity;
        self.ctoken_supply -= ctokens;
        Ok(liquidity)
    }

    /// Lend out underlying tokens. The borrow fee is added on top of `amount` to the debt.
    ///
    /// Returns the debt created, `amount` plus the borrow fee
    ///
    /// ### Arguments
    /// * `amount` - The amount of underlying tokens leaving the reserve
    /// * `now` - The current timestamp
    ///
    /// ### Errors
    /// If the reserve does not hold enough undeployed liquidity or the borrow limit is exceeded
    pub fn borrow_liquidity(&mut self, amount: u64, now: u64) -> Result<Decimal, LendingError> {
        self.compound_interest(now)?;
        if amount > self.available_amount {
            return Err(LendingError::InsufficientLiquidity);
        }
        let fee = Decimal::from(self.calc_borrow_fee(amount)?);
        let debt = Decimal::from(amount).try_add(fee)?;
        let new_borrowed = self.borrowed_amount.try_add(debt)?;
        if new_borrowed > Decimal::from(self.config.borrow_limit) {
            return Err(LendingError::BorrowLimitExceeded);
        }
        let new_fees = self.fees_accumulated.try_add(fee)?;

        self.available_amount -= amount;
        self.borrowed_amount = new_borrowed;
        self.fees_accumulated = new_fees;
        Ok(debt)
    }

    /// Settle debt owed to the reserve. Debt is cleared down to zero and never underflows.
    ///
    /// Returns the amount of underlying tokens that must be paid, `settle_amount` rounded up
    ///
    /// ### Arguments
    /// * `settle_amount` - The amount of debt being settled
    /// * `now` - The current timestamp
    pub fn repay_liquidity(&mut self, settle_amount: Decimal, now: u64) -> Result<u64, LendingError> {
        self.compound_interest(now)?;
        let paid = settle_amount.try_ceil_u64()?;
        let new_available = self
            .available_amount
            .checked_add(paid)
            .ok_or(LendingError::ArithmeticOverflow)?;

        self.available_amount = new_available;
        self.borrowed_amount = self.borrowed_amount.saturating_sub(settle_amount);
        Ok(paid)
    }

    /********** Fees **********/

    /// Fetch the borrow fee for a borrow amount, rounded up
    ///
    /// ### Arguments
    /// * `amount` - The amount of underlying tokens being borrowed
    pub fn calc_borrow_fee(&self, amount: u64) -> Result<u64, LendingError> {
        let fee = i128(amount)
            .fixed_mul_ceil(i128(self.config.borrow_fee_bps), SCALAR_BPS)
            .ok_or(LendingError::ArithmeticOverflow)?;
        cast::u64(fee).map_err(|_| LendingError::ArithmeticOverflow)
    }

    /// Burn ctokens and transfer the liquidity they are worth to the protocol
    ///
    /// ### Arguments
    /// * `ctokens` - The amount of ctokens to burn
    pub fn burn_ctokens_into_fees(&mut self, ctokens: u64) -> Result<(), LendingError> {
        if ctokens > self.ctoken_supply {
            return Err(LendingError::InsufficientCTokens);
        }
        let value = self.ctokens_to_liquidity(ctokens)?;
        self.fees_accumulated = self.fees_accumulated.try_add(value)?;
        self.ctoken_supply -= ctokens;
        Ok(())
    }

    /// Release the whole-token part of the accumulated fees that is currently undeployed
    ///
    /// Returns the amount of underlying tokens claimed
    pub fn claim_fees(&mut self) -> Result<u64, LendingError> {
        let claimable = self
            .fees_accumulated
            .try_floor_u64()?
            .min(self.available_amount);
        self.fees_accumulated = self.fees_accumulated.try_sub(Decimal::from(claimable))?;
        self.available_amount -= claimable;
        Ok(claimable)
    }

    /********** Admin **********/

    /// Replace the reserve configuration
    ///
    /// ### Errors
    /// If the new configuration is invalid
    pub fn update_config(&mut self, config: ReserveConfig) -> Result<(), LendingError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Set a new price for the reserve
    ///
    /// ### Arguments
    /// * `price` - The USD price of one whole token
    /// * `timestamp` - The time the price was observed
    pub fn update_price(&mut self, price: Decimal, timestamp: u64) {
        self.price = price;
        self.price_last_update_timestamp = timestamp;
    }
}
