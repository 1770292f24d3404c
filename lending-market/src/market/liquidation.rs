use cast::i128;
use sep_41_token::TokenClient;
use soroban_fixed_point_math::FixedPoint;
use soroban_sdk::{contracttype, Address, Env};

use crate::{constants::SCALAR_BPS, errors::LendingError, storage};

use super::{market::Market, obligation::Obligation, reserve::Reserve};

/// The settlement of a liquidation
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct LiquidationResult {
    pub repaid: u64,           // the underlying tokens transferred from the liquidator
    pub seized_ctokens: u64,   // the ctokens credited to the liquidator
    pub protocol_ctokens: u64, // the ctokens burned as the liquidation fee
}

/// Calculate the share of seized ctokens kept by the protocol. The fee only applies to
/// the bonus part of the seized collateral.
///
/// ### Arguments
/// * `reserve` - The reserve the collateral is seized from
/// * `withdraw_ctokens` - The total ctokens seized, including the bonus
pub fn calc_liquidation_fee(reserve: &Reserve, withdraw_ctokens: u64) -> Result<u64, LendingError> {
    let bonus_pct = i128(reserve.config.liquidation_bonus_pct);
    let bonus_ctokens = i128(withdraw_ctokens)
        .fixed_mul_floor(bonus_pct, 100 + bonus_pct)
        .ok_or(LendingError::ArithmeticOverflow)?;
    let fee = bonus_ctokens
        .fixed_mul_floor(i128(reserve.config.liquidation_fee_bps), SCALAR_BPS)
        .ok_or(LendingError::ArithmeticOverflow)?;
    cast::u64(fee).map_err(|_| LendingError::ArithmeticOverflow)
}

/// Liquidate an unhealthy obligation. The liquidator repays debt in `repay_asset` and
/// receives the obligation's `withdraw_asset` ctokens worth the repaid value plus the
/// liquidation bonus, less the protocol fee. Any part of `repay_amount` not needed is
/// never transferred.
#[allow(clippy::too_many_arguments)]
pub fn execute_liquidate(
    e: &Env,
    market: &mut Market,
    liquidator: &Address,
    obligation: &mut Obligation,
    repay_asset: &Address,
    repay_amount: u64,
    withdraw_asset: &Address,
    now: u64,
) -> Result<LiquidationResult, LendingError> {
    if repay_amount == 0 {
        return Err(LendingError::InvalidAmount);
    }
    let ticket = obligation.refresh(e, market, now)?;
    let repay_index = market.load_reserve_by_asset(e, repay_asset)?.index;
    let withdraw_index = market.load_reserve_by_asset(e, withdraw_asset)?.index;
    let mut repay_reserve = market.load_compounded_reserve(e, repay_index, now)?;
    let withdraw_reserve = market.load_compounded_reserve(e, withdraw_index, now)?;

    let amounts = obligation.liquidate(ticket, &repay_reserve, &withdraw_reserve, repay_amount, now)?;

    let mut repay_treasury = market.load_treasury(repay_asset)?;
    let repaid = repay_reserve.repay_liquidity(amounts.settle_amount, now)?;
    repay_treasury.deposit(repaid)?;
    market.cache_reserve(repay_reserve, true);
    market.cache_treasury(repay_treasury);

    // reload in case both sides of the liquidation are the same reserve
    let mut withdraw_reserve = market.load_reserve(e, withdraw_index)?;
    let mut withdraw_treasury = market.load_treasury(withdraw_asset)?;
    let protocol_ctokens = calc_liquidation_fee(&withdraw_reserve, amounts.withdraw_ctokens)?;
    withdraw_reserve.burn_ctokens_into_fees(protocol_ctokens)?;
    withdraw_treasury.burn_ctokens(protocol_ctokens)?;
    market.cache_reserve(withdraw_reserve, true);
    market.cache_treasury(withdraw_treasury);

    let seized_ctokens = amounts.withdraw_ctokens - protocol_ctokens;
    let balance = storage::get_ctoken_balance(e, liquidator, withdraw_index)
        .checked_add(seized_ctokens)
        .ok_or(LendingError::ArithmeticOverflow)?;

    market.store(e)?;
    obligation.store(e);
    storage::set_ctoken_balance(e, liquidator, withdraw_index, balance);

    TokenClient::new(e, repay_asset).transfer(
        liquidator,
        &e.current_contract_address(),
        &i128(repaid),
    );
    Ok(LiquidationResult {
        repaid,
        seized_ctokens,
        protocol_ctokens,
    })
}
