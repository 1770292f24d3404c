use cast::i128;
use sep_41_token::TokenClient;
use soroban_sdk::{Address, Env};

use crate::{errors::LendingError, math::Decimal, storage};

use super::{capability::ObligationOwnerCap, market::Market, obligation::Obligation};

fn require_positive(amount: u64) -> Result<(), LendingError> {
    if amount == 0 {
        return Err(LendingError::InvalidAmount);
    }
    Ok(())
}

/// Create an empty obligation
///
/// Returns the id of the obligation
pub fn execute_create_obligation(e: &Env, owner: &Address) -> Result<u64, LendingError> {
    if !storage::has_market_config(e) {
        return Err(LendingError::NotInitialized);
    }
    let id = storage::next_obligation_id(e);
    Obligation::new(e, id, owner.clone()).store(e);
    Ok(id)
}

/// Deposit underlying tokens into a reserve and credit the minted ctokens to `from`
///
/// Returns the amount of ctokens minted
pub fn execute_deposit_liquidity_and_mint_ctokens(
    e: &Env,
    market: &mut Market,
    from: &Address,
    asset: &Address,
    amount: u64,
    now: u64,
) -> Result<u64, LendingError> {
    require_positive(amount)?;
    let mut reserve = market.load_reserve_by_asset(e, asset)?;
    let mut treasury = market.load_treasury(asset)?;

    let minted = reserve.deposit_liquidity_and_mint_ctokens(amount, now)?;
    treasury.deposit(amount)?;
    treasury.mint_ctokens(minted)?;
    let balance = storage::get_ctoken_balance(e, from, reserve.index)
        .checked_add(minted)
        .ok_or(LendingError::ArithmeticOverflow)?;

    let index = reserve.index;
    market.cache_reserve(reserve, true);
    market.cache_treasury(treasury);
    market.store(e)?;
    storage::set_ctoken_balance(e, from, index, balance);

    TokenClient::new(e, asset).transfer(from, &e.current_contract_address(), &i128(amount));
    Ok(minted)
}

/// Burn free ctokens held by `from` and transfer the underlying tokens they are worth
///
/// Returns the amount of underlying tokens transferred
pub fn execute_redeem_ctokens_and_withdraw_liquidity(
    e: &Env,
    market: &mut Market,
    from: &Address,
    asset: &Address,
    ctokens: u64,
    now: u64,
) -> Result<u64, LendingError> {
    require_positive(ctokens)?;
    let mut reserve = market.load_reserve_by_asset(e, asset)?;
    let mut treasury = market.load_treasury(asset)?;
    let balance = storage::get_ctoken_balance(e, from, reserve.index)
        .checked_sub(ctokens)
        .ok_or(LendingError::InsufficientCTokens)?;

    let liquidity = reserve.redeem_ctokens(ctokens, now)?;
    treasury.withdraw(liquidity)?;
    treasury.burn_ctokens(ctokens)?;

    let index = reserve.index;
    market.cache_reserve(reserve, true);
    market.cache_treasury(treasury);
    market.store(e)?;
    storage::set_ctoken_balance(e, from, index, balance);

    if liquidity > 0 {
        TokenClient::new(e, asset).transfer(&e.current_contract_address(), from, &i128(liquidity));
    }
    Ok(liquidity)
}

/// Move free ctokens held by `from` into the custody of an obligation as collateral
pub fn execute_deposit_ctokens_into_obligation(
    e: &Env,
    market: &Market,
    cap: &ObligationOwnerCap,
    from: &Address,
    obligation: &mut Obligation,
    asset: &Address,
    ctokens: u64,
) -> Result<(), LendingError> {
    cap.require_obligation(obligation)?;
    require_positive(ctokens)?;
    let reserve = market.load_reserve_by_asset(e, asset)?;
    let balance = storage::get_ctoken_balance(e, from, reserve.index)
        .checked_sub(ctokens)
        .ok_or(LendingError::InsufficientCTokens)?;

    obligation.deposit(reserve.index, ctokens)?;
    obligation.store(e);
    storage::set_ctoken_balance(e, from, reserve.index, balance);
    Ok(())
}

/// Borrow underlying tokens against an obligation and transfer them to its owner
///
/// Returns the debt added to the obligation, including the borrow fee
pub fn execute_borrow(
    e: &Env,
    market: &mut Market,
    cap: &ObligationOwnerCap,
    obligation: &mut Obligation,
    asset: &Address,
    amount: u64,
    now: u64,
) -> Result<Decimal, LendingError> {
    cap.require_obligation(obligation)?;
    require_positive(amount)?;

    let ticket = obligation.refresh(e, market, now)?;
    let mut reserve = market.load_reserve_by_asset(e, asset)?;
    let mut treasury = market.load_treasury(asset)?;
    let debt = reserve.borrow_liquidity(amount, now)?;
    obligation.borrow(ticket, &reserve, debt, now)?;
    treasury.withdraw(amount)?;

    market.cache_reserve(reserve, true);
    market.cache_treasury(treasury);
    market.store(e)?;
    obligation.store(e);

    TokenClient::new(e, asset).transfer(
        &e.current_contract_address(),
        &obligation.owner,
        &i128(amount),
    );
    Ok(debt)
}

/// Withdraw collateral from an obligation and credit the ctokens to its owner
///
/// Returns the amount of ctokens withdrawn
pub fn execute_withdraw(
    e: &Env,
    market: &mut Market,
    cap: &ObligationOwnerCap,
    obligation: &mut Obligation,
    asset: &Address,
    ctokens: u64,
    now: u64,
) -> Result<u64, LendingError> {
    cap.require_obligation(obligation)?;
    require_positive(ctokens)?;

    let ticket = obligation.refresh(e, market, now)?;
    let reserve = market.load_reserve_by_asset(e, asset)?;
    let withdrawn = obligation.withdraw(ticket, &reserve, ctokens, now)?;
    let balance = storage::get_ctoken_balance(e, &obligation.owner, reserve.index)
        .checked_add(withdrawn)
        .ok_or(LendingError::ArithmeticOverflow)?;

    market.store(e)?;
    obligation.store(e);
    storage::set_ctoken_balance(e, &obligation.owner, reserve.index, balance);
    Ok(withdrawn)
}

/// Repay debt of an obligation on behalf of anyone. Only the settled debt, rounded up, is
/// transferred from `from`.
///
/// Returns the amount of underlying tokens transferred
pub fn execute_repay(
    e: &Env,
    market: &mut Market,
    from: &Address,
    obligation: &mut Obligation,
    asset: &Address,
    amount: u64,
    now: u64,
) -> Result<u64, LendingError> {
    require_positive(amount)?;
    let index = market.load_reserve_by_asset(e, asset)?.index;
    let mut reserve = market.load_compounded_reserve(e, index, now)?;
    let mut treasury = market.load_treasury(asset)?;

    let settled = obligation.repay(&reserve, amount)?;
    let paid = reserve.repay_liquidity(settled, now)?;
    treasury.deposit(paid)?;

    market.cache_reserve(reserve, true);
    market.cache_treasury(treasury);
    market.store(e)?;
    obligation.store(e);

    if paid > 0 {
        TokenClient::new(e, asset).transfer(from, &e.current_contract_address(), &i128(paid));
    }
    Ok(paid)
}
