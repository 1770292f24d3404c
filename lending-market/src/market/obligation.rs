use soroban_sdk::{contracttype, vec, Address, Env, Vec};

use crate::{
    constants::{CLOSE_FACTOR_PCT, MAX_OBLIGATION_POSITIONS},
    errors::LendingError,
    math::Decimal,
    storage,
};

use super::{market::Market, reserve::Reserve};

/// Collateral held by an obligation in a single reserve
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct Deposit {
    pub reserve_index: u32,
    pub ctoken_amount: u64,        // the ctokens held in custody by the obligation
    pub market_value_usd: Decimal, // the value of the ctokens as of the last refresh
}

/// Debt owed by an obligation to a single reserve
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct Borrow {
    pub reserve_index: u32,
    pub borrowed_amount: Decimal, // the debt in underlying tokens as of the snapshot
    pub cumulative_borrow_rate_snapshot: Decimal, // the reserve's borrow rate at the snapshot
    pub market_value_usd: Decimal, // the value of the debt as of the last refresh
}

impl Borrow {
    /// Accrue interest on the debt up to the reserve's cumulative borrow rate
    fn normalize(&mut self, cumulative_borrow_rate: Decimal) -> Result<(), LendingError> {
        self.borrowed_amount = self
            .borrowed_amount
            .try_mul(cumulative_borrow_rate)?
            .try_div(self.cumulative_borrow_rate_snapshot)?;
        self.cumulative_borrow_rate_snapshot = cumulative_borrow_rate;
        Ok(())
    }
}

/// A borrower's position in the market
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct Obligation {
    pub id: u64,
    pub owner: Address,
    pub deposits: Vec<Deposit>,
    pub borrows: Vec<Borrow>,
    pub deposited_value_usd: Decimal, // the value of all deposits
    pub unweighted_borrowed_value_usd: Decimal, // the value of all borrows
    pub weighted_borrowed_value_usd: Decimal, // the value of all borrows scaled by borrow weight
    pub allowed_borrow_value_usd: Decimal, // the borrow value allowed by the open LTV of deposits
    pub unhealthy_borrow_value_usd: Decimal, // the borrow value at which liquidation is allowed
}

/// Proof that an obligation was refreshed during the current operation. Produced only by
/// `Obligation::refresh` and consumed by every operation that can reduce its health.
#[derive(Debug)]
#[must_use]
pub struct RefreshTicket {
    obligation_id: u64,
    timestamp: u64,
}

impl RefreshTicket {
    /// Consume the ticket
    ///
    /// ### Errors
    /// If the ticket was produced for a different obligation or timestamp
    fn consume(self, obligation: &Obligation, now: u64) -> Result<(), LendingError> {
        if self.obligation_id != obligation.id || self.timestamp != now {
            return Err(LendingError::TicketNotFresh);
        }
        Ok(())
    }
}

/// The outcome of a liquidation against an obligation
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LiquidationAmounts {
    pub settle_amount: Decimal, // the debt settled in the repay reserve's tokens
    pub repay_value_usd: Decimal,
    pub withdraw_ctokens: u64, // the collateral seized from the withdraw reserve
    pub withdraw_value_usd: Decimal,
}

impl Obligation {
    /// Create an empty obligation
    pub fn new(e: &Env, id: u64, owner: Address) -> Self {
        Obligation {
            id,
            owner,
            deposits: vec![e],
            borrows: vec![e],
            deposited_value_usd: Decimal::zero(),
            unweighted_borrowed_value_usd: Decimal::zero(),
            weighted_borrowed_value_usd: Decimal::zero(),
            allowed_borrow_value_usd: Decimal::zero(),
            unhealthy_borrow_value_usd: Decimal::zero(),
        }
    }

    /// Load an obligation from the ledger
    ///
    /// ### Errors
    /// If the obligation does not exist
    pub fn load(e: &Env, id: u64) -> Result<Self, LendingError> {
        storage::get_obligation(e, id).ok_or(LendingError::ObligationNotFound)
    }

    /// Store the obligation to the ledger
    pub fn store(&self, e: &Env) {
        storage::set_obligation(e, self);
    }

    /********** Health **********/

    /// Borrows are below the allowed borrow value
    pub fn is_healthy(&self) -> bool {
        self.weighted_borrowed_value_usd < self.allowed_borrow_value_usd
    }

    /// Borrows reached the unhealthy borrow value
    pub fn is_liquidatable(&self) -> bool {
        !self.borrows.is_empty() && self.weighted_borrowed_value_usd >= self.unhealthy_borrow_value_usd
    }

    /// Debt is worth more than the collateral
    pub fn is_underwater(&self) -> bool {
        self.unweighted_borrowed_value_usd > self.deposited_value_usd
    }

    /********** Positions **********/

    /// Find the deposit entry for a reserve
    pub fn find_deposit(&self, reserve_index: u32) -> Option<(u32, Deposit)> {
        for i in 0..self.deposits.len() {
            let deposit = self.deposits.get_unchecked(i);
            if deposit.reserve_index == reserve_index {
                return Some((i, deposit));
            }
        }
        None
    }

    /// Find the borrow entry for a reserve
    pub fn find_borrow(&self, reserve_index: u32) -> Option<(u32, Borrow)> {
        for i in 0..self.borrows.len() {
            let borrow = self.borrows.get_unchecked(i);
            if borrow.reserve_index == reserve_index {
                return Some((i, borrow));
            }
        }
        None
    }

    fn require_position_capacity(&self) -> Result<(), LendingError> {
        if self.deposits.len() + self.borrows.len() >= MAX_OBLIGATION_POSITIONS {
            return Err(LendingError::MaxPositionsExceeded);
        }
        Ok(())
    }

    /********** Refresh **********/

    /// Accrue interest on every reserve the obligation touches and recompute the value of
    /// every deposit and borrow at current prices.
    ///
    /// Returns a ticket that must be consumed by the next health reducing operation
    ///
    /// ### Arguments
    /// * `market` - The market the touched reserves are loaded from and cached in
    /// * `now` - The current timestamp
    ///
    /// ### Errors
    /// If any touched reserve has a stale price
    pub fn refresh(
        &mut self,
        e: &Env,
        market: &mut Market,
        now: u64,
    ) -> Result<RefreshTicket, LendingError> {
        let mut deposits: Vec<Deposit> = vec![e];
        let mut deposited_value_usd = Decimal::zero();
        let mut allowed_borrow_value_usd = Decimal::zero();
        let mut unhealthy_borrow_value_usd = Decimal::zero();
        for mut deposit in self.deposits.iter() {
            let reserve = market.load_compounded_reserve(e, deposit.reserve_index, now)?;
            let liquidity = reserve.ctokens_to_liquidity(deposit.ctoken_amount)?;
            deposit.market_value_usd = reserve.market_value(liquidity, now)?;

            deposited_value_usd = deposited_value_usd.try_add(deposit.market_value_usd)?;
            allowed_borrow_value_usd = allowed_borrow_value_usd
                .try_add(open_ltv_value(&reserve, deposit.market_value_usd)?)?;
            unhealthy_borrow_value_usd = unhealthy_borrow_value_usd
                .try_add(close_ltv_value(&reserve, deposit.market_value_usd)?)?;
            deposits.push_back(deposit);
        }

        let mut borrows: Vec<Borrow> = vec![e];
        let mut unweighted_borrowed_value_usd = Decimal::zero();
        let mut weighted_borrowed_value_usd = Decimal::zero();
        for mut borrow in self.borrows.iter() {
            let reserve = market.load_compounded_reserve(e, borrow.reserve_index, now)?;
            borrow.normalize(reserve.cumulative_borrow_rate)?;
            borrow.market_value_usd = reserve.market_value(borrow.borrowed_amount, now)?;

            unweighted_borrowed_value_usd =
                unweighted_borrowed_value_usd.try_add(borrow.market_value_usd)?;
            weighted_borrowed_value_usd = weighted_borrowed_value_usd
                .try_add(weighted_value(&reserve, borrow.market_value_usd)?)?;
            borrows.push_back(borrow);
        }

        self.deposits = deposits;
        self.borrows = borrows;
        self.deposited_value_usd = deposited_value_usd;
        self.allowed_borrow_value_usd = allowed_borrow_value_usd;
        self.unhealthy_borrow_value_usd = unhealthy_borrow_value_usd;
        self.unweighted_borrowed_value_usd = unweighted_borrowed_value_usd;
        self.weighted_borrowed_value_usd = weighted_borrowed_value_usd;
        Ok(RefreshTicket {
            obligation_id: self.id,
            timestamp: now,
        })
    }

    /********** Actions **********/

    /// Take custody of ctokens as collateral. Valuation is deferred to the next refresh.
    ///
    /// ### Arguments
    /// * `reserve_index` - The index of the reserve the ctokens belong to
    /// * `ctokens` - The amount of ctokens
    ///
    /// ### Errors
    /// If a new entry would exceed the maximum number of positions
    pub fn deposit(&mut self, reserve_index: u32, ctokens: u64) -> Result<(), LendingError> {
        match self.find_deposit(reserve_index) {
            Some((i, mut deposit)) => {
                deposit.ctoken_amount = deposit
                    .ctoken_amount
                    .checked_add(ctokens)
                    .ok_or(LendingError::ArithmeticOverflow)?;
                self.deposits.set(i, deposit);
            }
            None => {
                self.require_position_capacity()?;
                self.deposits.push_back(Deposit {
                    reserve_index,
                    ctoken_amount: ctokens,
                    market_value_usd: Decimal::zero(),
                });
            }
        }
        Ok(())
    }

    /// Add debt to the obligation
    ///
    /// ### Arguments
    /// * `ticket` - The refresh ticket for this obligation
    /// * `reserve` - The reserve the debt was drawn from, compounded to `now`
    /// * `debt` - The debt added, including fees
    /// * `now` - The current timestamp
    ///
    /// ### Errors
    /// If the ticket is not fresh or the weighted borrow value would exceed the allowed
    /// borrow value
    pub fn borrow(
        &mut self,
        ticket: RefreshTicket,
        reserve: &Reserve,
        debt: Decimal,
        now: u64,
    ) -> Result<(), LendingError> {
        ticket.consume(self, now)?;

        let (position, mut borrow) = match self.find_borrow(reserve.index) {
            Some((i, mut borrow)) => {
                borrow.normalize(reserve.cumulative_borrow_rate)?;
                (Some(i), borrow)
            }
            None => {
                self.require_position_capacity()?;
                let borrow = Borrow {
                    reserve_index: reserve.index,
                    borrowed_amount: Decimal::zero(),
                    cumulative_borrow_rate_snapshot: reserve.cumulative_borrow_rate,
                    market_value_usd: Decimal::zero(),
                };
                (None, borrow)
            }
        };
        let prev_value = borrow.market_value_usd;
        borrow.borrowed_amount = borrow.borrowed_amount.try_add(debt)?;
        borrow.market_value_usd = reserve.market_value(borrow.borrowed_amount, now)?;

        let unweighted = self
            .unweighted_borrowed_value_usd
            .try_add(borrow.market_value_usd)?
            .saturating_sub(prev_value);
        let weighted = self
            .weighted_borrowed_value_usd
            .try_add(weighted_value(reserve, borrow.market_value_usd)?)?
            .saturating_sub(weighted_value(reserve, prev_value)?);
        if weighted > self.allowed_borrow_value_usd {
            return Err(LendingError::ExceedsAllowedBorrow);
        }

        match position {
            Some(i) => self.borrows.set(i, borrow),
            None => self.borrows.push_back(borrow),
        }
        self.unweighted_borrowed_value_usd = unweighted;
        self.weighted_borrowed_value_usd = weighted;
        Ok(())
    }

    /// Release collateral from the obligation
    ///
    /// Returns the amount of ctokens withdrawn
    ///
    /// ### Arguments
    /// * `ticket` - The refresh ticket for this obligation
    /// * `reserve` - The reserve the ctokens belong to, compounded to `now`
    /// * `ctokens` - The amount of ctokens to withdraw
    /// * `now` - The current timestamp
    ///
    /// ### Errors
    /// If the ticket is not fresh, the obligation holds fewer ctokens, or the remaining
    /// collateral no longer covers the weighted borrow value
    pub fn withdraw(
        &mut self,
        ticket: RefreshTicket,
        reserve: &Reserve,
        ctokens: u64,
        now: u64,
    ) -> Result<u64, LendingError> {
        ticket.consume(self, now)?;

        let (position, mut deposit) = self
            .find_deposit(reserve.index)
            .ok_or(LendingError::InsufficientDeposit)?;
        if ctokens > deposit.ctoken_amount {
            return Err(LendingError::InsufficientDeposit);
        }
        let prev_value = deposit.market_value_usd;
        deposit.ctoken_amount -= ctokens;
        let liquidity = reserve.ctokens_to_liquidity(deposit.ctoken_amount)?;
        deposit.market_value_usd = reserve.market_value(liquidity, now)?;

        let deposited = self
            .deposited_value_usd
            .try_add(deposit.market_value_usd)?
            .saturating_sub(prev_value);
        let allowed = self
            .allowed_borrow_value_usd
            .try_add(open_ltv_value(reserve, deposit.market_value_usd)?)?
            .saturating_sub(open_ltv_value(reserve, prev_value)?);
        let unhealthy = self
            .unhealthy_borrow_value_usd
            .try_add(close_ltv_value(reserve, deposit.market_value_usd)?)?
            .saturating_sub(close_ltv_value(reserve, prev_value)?);
        if self.weighted_borrowed_value_usd > allowed {
            return Err(LendingError::BelowRequiredCollateral);
        }

        if deposit.ctoken_amount == 0 {
            self.deposits.remove(position);
        } else {
            self.deposits.set(position, deposit);
        }
        self.deposited_value_usd = deposited;
        self.allowed_borrow_value_usd = allowed;
        self.unhealthy_borrow_value_usd = unhealthy;
        Ok(ctokens)
    }

    /// Settle debt owed by the obligation. Repayment is clamped to the outstanding debt.
    /// Valuations are scaled down with the debt and fully recomputed on the next refresh.
    ///
    /// Returns the amount of debt settled
    ///
    /// ### Arguments
    /// * `reserve` - The reserve the debt is owed to, compounded to the current timestamp
    /// * `amount` - The maximum amount of underlying tokens to repay
    ///
    /// ### Errors
    /// If the obligation owes nothing to the reserve
    pub fn repay(&mut self, reserve: &Reserve, amount: u64) -> Result<Decimal, LendingError> {
        let (position, mut borrow) = self
            .find_borrow(reserve.index)
            .ok_or(LendingError::BorrowNotFound)?;
        borrow.normalize(reserve.cumulative_borrow_rate)?;

        let outstanding = borrow.borrowed_amount;
        let settled = Decimal::from(amount).min(outstanding);
        let remaining = outstanding.try_sub(settled)?;

        let prev_value = borrow.market_value_usd;
        let new_value = if remaining.is_zero() {
            Decimal::zero()
        } else {
            prev_value.try_mul(remaining)?.try_div(outstanding)?
        };
        let removed_value = prev_value.try_sub(new_value)?;
        self.unweighted_borrowed_value_usd = self
            .unweighted_borrowed_value_usd
            .saturating_sub(removed_value);
        self.weighted_borrowed_value_usd = self
            .weighted_borrowed_value_usd
            .saturating_sub(weighted_value(reserve, removed_value)?);

        if remaining.is_zero() {
            self.borrows.remove(position);
        } else {
            borrow.borrowed_amount = remaining;
            borrow.market_value_usd = new_value;
            self.borrows.set(position, borrow);
        }
        Ok(settled)
    }

    /// Repay debt of an unhealthy obligation in exchange for its collateral plus a bonus.
    /// At most the close factor share of the total borrow value can be repaid at once.
    ///
    /// ### Arguments
    /// * `ticket` - The refresh ticket for this obligation
    /// * `repay_reserve` - The reserve being repaid, compounded to `now`
    /// * `withdraw_reserve` - The reserve whose collateral is seized, compounded to `now`
    /// * `repay_amount` - The maximum amount of `repay_reserve` tokens to repay
    /// * `now` - The current timestamp
    ///
    /// ### Errors
    /// If the ticket is not fresh, the obligation is not liquidatable, or it holds no
    /// debt or collateral in the given reserves
    pub fn liquidate(
        &mut self,
        ticket: RefreshTicket,
        repay_reserve: &Reserve,
        withdraw_reserve: &Reserve,
        repay_amount: u64,
        now: u64,
    ) -> Result<LiquidationAmounts, LendingError> {
        ticket.consume(self, now)?;
        if !self.is_liquidatable() {
            return Err(LendingError::NotLiquidatable);
        }
        let (borrow_position, mut borrow) = self
            .find_borrow(repay_reserve.index)
            .ok_or(LendingError::BorrowNotFound)?;
        let (deposit_position, mut deposit) = self
            .find_deposit(withdraw_reserve.index)
            .ok_or(LendingError::InsufficientDeposit)?;

        let max_repay_usd = self
            .unweighted_borrowed_value_usd
            .try_mul(Decimal::from_percent(CLOSE_FACTOR_PCT))?;
        let mut repay_value_usd = repay_reserve
            .market_value(Decimal::from(repay_amount), now)?
            .min(max_repay_usd)
            .min(borrow.market_value_usd);
        let bonus_rate = Decimal::one()
            .try_add(Decimal::from_percent(withdraw_reserve.config.liquidation_bonus_pct))?;
        let mut withdraw_value_usd = repay_value_usd.try_mul(bonus_rate)?;
        if withdraw_value_usd >= deposit.market_value_usd {
            withdraw_value_usd = deposit.market_value_usd;
            repay_value_usd = withdraw_value_usd.try_div(bonus_rate)?;
        }

        let settle_amount = if repay_value_usd == borrow.market_value_usd {
            borrow.borrowed_amount
        } else {
            repay_reserve
                .usd_to_token_amount(repay_value_usd, now)?
                .min(borrow.borrowed_amount)
        };
        let settle_amount = settle_amount.min(Decimal::from(repay_amount));
        let withdraw_ctokens = if withdraw_value_usd == deposit.market_value_usd {
            deposit.ctoken_amount
        } else {
            Decimal::from(deposit.ctoken_amount)
                .try_mul(withdraw_value_usd)?
                .try_div(deposit.market_value_usd)?
                .try_floor_u64()?
        };
        if settle_amount.is_zero() || withdraw_ctokens == 0 {
            return Err(LendingError::InvalidAmount);
        }

        borrow.borrowed_amount = borrow.borrowed_amount.try_sub(settle_amount)?;
        borrow.market_value_usd = borrow.market_value_usd.saturating_sub(repay_value_usd);
        deposit.ctoken_amount -= withdraw_ctokens;
        deposit.market_value_usd = deposit.market_value_usd.saturating_sub(withdraw_value_usd);

        self.unweighted_borrowed_value_usd = self
            .unweighted_borrowed_value_usd
            .saturating_sub(repay_value_usd);
        self.weighted_borrowed_value_usd = self
            .weighted_borrowed_value_usd
            .saturating_sub(weighted_value(repay_reserve, repay_value_usd)?);
        self.deposited_value_usd = self.deposited_value_usd.saturating_sub(withdraw_value_usd);
        self.allowed_borrow_value_usd = self
            .allowed_borrow_value_usd
            .saturating_sub(open_ltv_value(withdraw_reserve, withdraw_value_usd)?);
        self.unhealthy_borrow_value_usd = self
            .unhealthy_borrow_value_usd
            .saturating_sub(close_ltv_value(withdraw_reserve, withdraw_value_usd)?);

        if borrow.borrowed_amount.is_zero() {
            self.borrows.remove(borrow_position);
        } else {
            self.borrows.set(borrow_position, borrow);
        }
        if deposit.ctoken_amount == 0 {
            self.deposits.remove(deposit_position);
        } else {
            self.deposits.set(deposit_position, deposit);
        }

        Ok(LiquidationAmounts {
            settle_amount,
            repay_value_usd,
            withdraw_ctokens,
            withdraw_value_usd,
        })
    }
}

fn open_ltv_value(reserve: &Reserve, value: Decimal) -> Result<Decimal, LendingError> {
    value.try_mul(Decimal::from_percent(reserve.config.open_ltv_pct))
}

fn close_ltv_value(reserve: &Reserve, value: Decimal) -> Result<Decimal, LendingError> {
    value.try_mul(Decimal::from_percent(reserve.config.close_ltv_pct))
}

fn weighted_value(reserve: &Reserve, value: Decimal) -> Result<Decimal, LendingError> {
    value.try_mul(Decimal::from_bps(reserve.config.borrow_weight_bps))
}
