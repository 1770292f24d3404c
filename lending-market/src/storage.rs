use soroban_sdk::{
    contracttype, map, vec, Address, Env, IntoVal, Map, Symbol, TryFromVal, Val, Vec,
};

use crate::{
    constants::MAX_RESERVES,
    errors::LendingError,
    market::{Obligation, Reserve, ReserveTreasury},
};

pub(crate) const LEDGER_THRESHOLD_SHARED: u32 = 172800; // ~ 10 days
pub(crate) const LEDGER_BUMP_SHARED: u32 = 241920; // ~ 14 days

pub(crate) const LEDGER_THRESHOLD_USER: u32 = 518400; // ~ 30 days
pub(crate) const LEDGER_BUMP_USER: u32 = 535670; // ~ 31 days

/********** Storage Types **********/

/// The market's config
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct MarketConfig {
    pub owner: Address,  // the owner of the market
    pub oracle: Address, // the SEP-40 price feed used to refresh reserve prices
}

/********** Storage Key Types **********/

const CONFIG_KEY: &str = "Config";
const RES_LIST_KEY: &str = "ResList";
const TREASURY_KEY: &str = "Treasury";
const NEXT_OBLIGATION_KEY: &str = "NextOblg";

#[derive(Clone)]
#[contracttype]
pub struct UserReserveKey {
    user: Address,
    reserve_id: u32,
}

#[derive(Clone)]
#[contracttype]
pub enum MarketDataKey {
    // The reserve at an index
    Reserve(u32),
    // An obligation by id
    Obligation(u64),
    // The free ctokens a user holds for a reserve
    CTokens(UserReserveKey),
}

/********** Storage **********/

/// Bump the instance rent for the contract
pub fn extend_instance(e: &Env) {
    e.storage()
        .instance()
        .extend_ttl(LEDGER_THRESHOLD_SHARED, LEDGER_BUMP_SHARED);
}

/// Fetch an entry in persistent storage that has a default value if it doesn't exist
fn get_persistent_default<K: IntoVal<Env, Val>, V: TryFromVal<Env, Val>>(
    e: &Env,
    key: &K,
    default: V,
    bump_threshold: u32,
    bump_amount: u32,
) -> V {
    if let Some(result) = e.storage().persistent().get::<K, V>(key) {
        e.storage()
            .persistent()
            .extend_ttl(key, bump_threshold, bump_amount);
        result
    } else {
        default
    }
}

/********** Market Config **********/

/// Fetch the market configuration, if the market was created
pub fn get_market_config(e: &Env) -> Option<MarketConfig> {
    e.storage().instance().get(&Symbol::new(e, CONFIG_KEY))
}

/// Set the market configuration
///
/// ### Arguments
/// * `config` - The market configuration
pub fn set_market_config(e: &Env, config: &MarketConfig) {
    e.storage()
        .instance()
        .set::<Symbol, MarketConfig>(&Symbol::new(e, CONFIG_KEY), config);
}

/// Checks if the market was created
pub fn has_market_config(e: &Env) -> bool {
    e.storage().instance().has(&Symbol::new(e, CONFIG_KEY))
}

/********** Reserve List (ResList) **********/

/// Fetch the list of reserve assets, ordered by reserve index
pub fn get_res_list(e: &Env) -> Vec<Address> {
    get_persistent_default(
        e,
        &Symbol::new(e, RES_LIST_KEY),
        vec![e],
        LEDGER_THRESHOLD_SHARED,
        LEDGER_BUMP_SHARED,
    )
}

/// Add a reserve to the back of the list and returns the index
///
/// ### Arguments
/// * `asset` - The contract address of the underlying asset
///
/// ### Errors
/// If the list is full
///
// @dev: Once added it can't be removed
pub fn push_res_list(e: &Env, asset: &Address) -> Result<u32, LendingError> {
    let mut res_list = get_res_list(e);
    if res_list.len() >= MAX_RESERVES {
        return Err(LendingError::MaxReservesExceeded);
    }
    res_list.push_back(asset.clone());
    let new_index = res_list.len() - 1;
    e.storage()
        .persistent()
        .set::<Symbol, Vec<Address>>(&Symbol::new(e, RES_LIST_KEY), &res_list);
    e.storage().persistent().extend_ttl(
        &Symbol::new(e, RES_LIST_KEY),
        LEDGER_THRESHOLD_SHARED,
        LEDGER_BUMP_SHARED,
    );
    Ok(new_index)
}

/********** Reserves **********/

/// Fetch the reserve at an index
///
/// ### Arguments
/// * `index` - The index of the reserve
pub fn get_reserve(e: &Env, index: u32) -> Option<Reserve> {
    get_persistent_default::<MarketDataKey, Option<Reserve>>(
        e,
        &MarketDataKey::Reserve(index),
        None,
        LEDGER_THRESHOLD_SHARED,
        LEDGER_BUMP_SHARED,
    )
}

/// Set the reserve at an index
///
/// ### Arguments
/// * `index` - The index of the reserve
/// * `reserve` - The reserve
pub fn set_reserve(e: &Env, index: u32, reserve: &Reserve) {
    let key = MarketDataKey::Reserve(index);
    e.storage()
        .persistent()
        .set::<MarketDataKey, Reserve>(&key, reserve);
    e.storage()
        .persistent()
        .extend_ttl(&key, LEDGER_THRESHOLD_SHARED, LEDGER_BUMP_SHARED);
}

/********** Treasuries **********/

/// Fetch the treasuries of every reserve, keyed by underlying asset
pub fn get_treasuries(e: &Env) -> Map<Address, ReserveTreasury> {
    get_persistent_default(
        e,
        &Symbol::new(e, TREASURY_KEY),
        map![e],
        LEDGER_THRESHOLD_SHARED,
        LEDGER_BUMP_SHARED,
    )
}

/// Set the treasuries of every reserve
///
/// ### Arguments
/// * `treasuries` - The map of underlying asset to treasury
pub fn set_treasuries(e: &Env, treasuries: &Map<Address, ReserveTreasury>) {
    e.storage()
        .persistent()
        .set::<Symbol, Map<Address, ReserveTreasury>>(&Symbol::new(e, TREASURY_KEY), treasuries);
    e.storage().persistent().extend_ttl(
        &Symbol::new(e, TREASURY_KEY),
        LEDGER_THRESHOLD_SHARED,
        LEDGER_BUMP_SHARED,
    );
}

/********** Obligations **********/

/// Fetch an obligation
///
/// ### Arguments
/// * `id` - The id of the obligation
pub fn get_obligation(e: &Env, id: u64) -> Option<Obligation> {
    get_persistent_default::<MarketDataKey, Option<Obligation>>(
        e,
        &MarketDataKey::Obligation(id),
        None,
        LEDGER_THRESHOLD_USER,
        LEDGER_BUMP_USER,
    )
}

/// Set an obligation
///
/// ### Arguments
/// * `obligation` - The obligation
pub fn set_obligation(e: &Env, obligation: &Obligation) {
    let key = MarketDataKey::Obligation(obligation.id);
    e.storage()
        .persistent()
        .set::<MarketDataKey, Obligation>(&key, obligation);
    e.storage()
        .persistent()
        .extend_ttl(&key, LEDGER_THRESHOLD_USER, LEDGER_BUMP_USER);
}

/// Reserve the next obligation id
pub fn next_obligation_id(e: &Env) -> u64 {
    let key = Symbol::new(e, NEXT_OBLIGATION_KEY);
    let id: u64 = e.storage().instance().get(&key).unwrap_or(0);
    e.storage().instance().set::<Symbol, u64>(&key, &(id + 1));
    id
}

/********** CToken Balances **********/

/// Fetch the free ctokens a user holds for a reserve
///
/// ### Arguments
/// * `user` - The address of the user
/// * `reserve_index` - The index of the reserve
pub fn get_ctoken_balance(e: &Env, user: &Address, reserve_index: u32) -> u64 {
    let key = MarketDataKey::CTokens(UserReserveKey {
        user: user.clone(),
        reserve_id: reserve_index,
    });
    get_persistent_default(e, &key, 0u64, LEDGER_THRESHOLD_USER, LEDGER_BUMP_USER)
}

/// Set the free ctokens a user holds for a reserve. Empty balances are removed.
///
/// ### Arguments
/// * `user` - The address of the user
/// * `reserve_index` - The index of the reserve
/// * `balance` - The new ctoken balance
pub fn set_ctoken_balance(e: &Env, user: &Address, reserve_index: u32, balance: u64) {
    let key = MarketDataKey::CTokens(UserReserveKey {
        user: user.clone(),
        reserve_id: reserve_index,
    });
    if balance == 0 {
        e.storage().persistent().remove(&key);
        return;
    }
    e.storage()
        .persistent()
        .set::<MarketDataKey, u64>(&key, &balance);
    e.storage()
        .persistent()
        .extend_ttl(&key, LEDGER_THRESHOLD_USER, LEDGER_BUMP_USER);
}
