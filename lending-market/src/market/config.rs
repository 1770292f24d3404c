use cast::i128;
use sep_41_token::TokenClient;
use soroban_sdk::{Address, Env};

use crate::{
    errors::LendingError,
    math::Decimal,
    storage::{self, MarketConfig},
};

use super::{
    capability::MarketOwnerCap,
    market::Market,
    reserve::{Reserve, ReserveConfig},
    treasury::ReserveTreasury,
};

/// Create the market. The stored market config is the one-time creation proof.
///
/// ### Errors
/// If the market was already created
pub fn execute_create_market(e: &Env, owner: &Address, oracle: &Address) -> Result<(), LendingError> {
    if storage::has_market_config(e) {
        return Err(LendingError::ProofAlreadyConsumed);
    }
    storage::set_market_config(
        e,
        &MarketConfig {
            owner: owner.clone(),
            oracle: oracle.clone(),
        },
    );
    Ok(())
}

/// Append a new reserve and its treasury to the market
///
/// Returns the index of the new reserve
///
/// ### Errors
/// If the capability is for another market, the asset already has a reserve, the market
/// is full, or the config is invalid
#[allow(clippy::too_many_arguments)]
pub fn execute_add_reserve(
    e: &Env,
    market: &mut Market,
    cap: &MarketOwnerCap,
    asset: &Address,
    config: ReserveConfig,
    mint_decimals: u32,
    initial_price: Decimal,
    now: u64,
) -> Result<u32, LendingError> {
    cap.require_market(e)?;
    if storage::get_res_list(e).contains(asset) {
        return Err(LendingError::ReserveAlreadyExists);
    }

    let index = storage::push_res_list(e, asset)?;
    let reserve = Reserve::new(index, asset.clone(), config, mint_decimals, initial_price, now)?;
    market.cache_reserve(reserve, true);
    market.cache_treasury(ReserveTreasury::new(asset.clone(), index));
    market.store(e)?;
    Ok(index)
}

/// Replace the configuration of a reserve. Interest is accrued at the old rate first.
///
/// ### Errors
/// If the capability is for another market, the reserve does not exist, or the config
/// is invalid
pub fn execute_update_reserve_config(
    e: &Env,
    market: &mut Market,
    cap: &MarketOwnerCap,
    asset: &Address,
    config: ReserveConfig,
    now: u64,
) -> Result<(), LendingError> {
    cap.require_market(e)?;
    let mut reserve = market.load_reserve_by_asset(e, asset)?;
    reserve.compound_interest(now)?;
    reserve.update_config(config)?;
    market.cache_reserve(reserve, true);
    market.store(e)
}

/// Update the price of a reserve from the market's oracle
///
/// Returns the new price
///
/// ### Errors
/// If the reserve does not exist, the oracle price is stale, or the oracle price is older
/// than the price already recorded
pub fn execute_refresh_reserve_price(
    e: &Env,
    market: &mut Market,
    asset: &Address,
    now: u64,
) -> Result<Decimal, LendingError> {
    let mut reserve = market.load_reserve_by_asset(e, asset)?;
    let (price, timestamp) = market.load_price(e, asset, now)?;
    if timestamp < reserve.price_last_update_timestamp {
        return Err(LendingError::StalePrice);
    }
    reserve.update_price(price, timestamp);
    market.cache_reserve(reserve, true);
    market.store(e)?;
    Ok(price)
}

/// Transfer the claimable protocol fees of a reserve
///
/// Returns the amount of underlying tokens transferred
///
/// ### Errors
/// If the capability is for another market or the reserve does not exist
pub fn execute_claim_fees(
    e: &Env,
    market: &mut Market,
    cap: &MarketOwnerCap,
    asset: &Address,
    to: &Address,
    now: u64,
) -> Result<u64, LendingError> {
    cap.require_market(e)?;
    let mut reserve = market.load_reserve_by_asset(e, asset)?;
    let mut treasury = market.load_treasury(asset)?;
    reserve.compound_interest(now)?;
    let claimed = reserve.claim_fees()?;
    treasury.withdraw(claimed)?;
    market.cache_reserve(reserve, true);
    market.cache_treasury(treasury);
    market.store(e)?;

    if claimed > 0 {
        TokenClient::new(e, asset).transfer(&e.current_contract_address(), to, &i128(claimed));
    }
    Ok(claimed)
}
