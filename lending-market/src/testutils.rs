#![cfg(test)]

use crate::{
    market::{
        execute_borrow, execute_create_obligation, execute_deposit_ctokens_into_obligation,
        execute_deposit_liquidity_and_mint_ctokens, InterestRateCurve, Market, Obligation,
        ObligationOwnerCap, Reserve, ReserveConfig, ReserveTreasury,
    },
    math::Decimal,
    storage::{self, MarketConfig},
    LendingMarketContract,
};
use sep_40_oracle::testutils::{MockPriceOracleClient, MockPriceOracleWASM};
use sep_41_token::testutils::{MockTokenClient, MockTokenWASM};
use soroban_sdk::{
    testutils::{Address as _, Ledger, LedgerInfo},
    vec, Address, Env, IntoVal,
};

pub(crate) fn create_market(e: &Env) -> Address {
    e.register_contract(None, LendingMarketContract {})
}

/// Create a market with a mock oracle and `owner` as the owner
pub(crate) fn create_market_with_owner<'a>(
    e: &Env,
    owner: &Address,
) -> (Address, MockPriceOracleClient<'a>) {
    let market_address = create_market(e);
    let (oracle, oracle_client) = create_mock_oracle(e);
    e.as_contract(&market_address, || {
        storage::set_market_config(
            e,
            &MarketConfig {
                owner: owner.clone(),
                oracle,
            },
        );
    });
    (market_address, oracle_client)
}

pub(crate) fn set_ledger_time(e: &Env, timestamp: u64) {
    e.ledger().set(LedgerInfo {
        timestamp,
        protocol_version: 20,
        sequence_number: 123,
        network_id: Default::default(),
        base_reserve: 10,
        min_temp_entry_ttl: 10,
        min_persistent_entry_ttl: 10,
        max_entry_ttl: 2000000,
    });
}

//************************************************
//           External Contract Helpers
//************************************************

// ***** Token *****

pub(crate) fn create_token_contract<'a>(
    e: &Env,
    admin: &Address,
) -> (Address, MockTokenClient<'a>) {
    let contract_address = Address::generate(e);
    e.register_contract_wasm(&contract_address, MockTokenWASM);
    let client = MockTokenClient::new(e, &contract_address);
    client.initialize(admin, &7, &"unit".into_val(e), &"test".into_val(e));
    (contract_address, client)
}

//***** Oracle ******

pub(crate) fn create_mock_oracle<'a>(e: &Env) -> (Address, MockPriceOracleClient<'a>) {
    let contract_address = e.register_contract_wasm(None, MockPriceOracleWASM);
    (
        contract_address.clone(),
        MockPriceOracleClient::new(e, &contract_address),
    )
}

//************************************************
//            Object Creation Helpers
//************************************************

//***** Reserve *****

pub(crate) fn default_reserve_config(e: &Env) -> ReserveConfig {
    ReserveConfig {
        open_ltv_pct: 50,
        close_ltv_pct: 80,
        borrow_weight_bps: 10_000,
        deposit_limit: u64::MAX,
        borrow_limit: u64::MAX,
        liquidation_bonus_pct: 5,
        borrow_fee_bps: 0,
        spread_fee_bps: 0,
        liquidation_fee_bps: 0,
        interest_rate: InterestRateCurve {
            utilization_pct: vec![e, 0, 80, 100],
            apr_bps: vec![e, 0, 1_000, 10_000],
        },
    }
}

/// An empty reserve with 7 decimals priced at 1.0 at time 0
pub(crate) fn default_reserve(e: &Env, index: u32, asset: &Address) -> Reserve {
    Reserve {
        index,
        asset: asset.clone(),
        config: default_reserve_config(e),
        mint_decimals: 7,
        price: Decimal::one(),
        price_last_update_timestamp: 0,
        available_amount: 0,
        ctoken_supply: 0,
        borrowed_amount: Decimal::zero(),
        cumulative_borrow_rate: Decimal::one(),
        interest_last_update_timestamp: 0,
        fees_accumulated: Decimal::zero(),
    }
}

/// Add an empty reserve to the market priced at 1.0 at the current ledger time.
///
/// Returns the index of the reserve
pub(crate) fn create_reserve(
    e: &Env,
    market_address: &Address,
    asset: &Address,
    config: &ReserveConfig,
    mint_decimals: u32,
) -> u32 {
    e.as_contract(market_address, || {
        let index = storage::push_res_list(e, asset).unwrap();
        let reserve = Reserve::new(
            index,
            asset.clone(),
            config.clone(),
            mint_decimals,
            Decimal::one(),
            e.ledger().timestamp(),
        )
        .unwrap();
        reserve.store(e);
        let mut treasuries = storage::get_treasuries(e);
        treasuries.set(asset.clone(), ReserveTreasury::new(asset.clone(), index));
        storage::set_treasuries(e, &treasuries);
        index
    })
}

//***** Obligation *****

/// Create an obligation for `owner` holding `deposit` of `asset` as collateral and
/// `borrow` of `asset` as debt. Must be called as the market contract, and `owner` must
/// hold `deposit` tokens.
///
/// Returns the id of the obligation
pub(crate) fn create_borrowed_obligation(
    e: &Env,
    owner: &Address,
    asset: &Address,
    deposit: u64,
    borrow: u64,
    now: u64,
) -> u64 {
    let id = execute_create_obligation(e, owner).unwrap();
    let mut market = Market::load(e).unwrap();
    let ctokens =
        execute_deposit_liquidity_and_mint_ctokens(e, &mut market, owner, asset, deposit, now)
            .unwrap();

    let market = Market::load(e).unwrap();
    let mut obligation = Obligation::load(e, id).unwrap();
    let cap = ObligationOwnerCap::authorize(&obligation);
    execute_deposit_ctokens_into_obligation(
        e,
        &market,
        &cap,
        owner,
        &mut obligation,
        asset,
        ctokens,
    )
    .unwrap();

    let mut market = Market::load(e).unwrap();
    execute_borrow(e, &mut market, &cap, &mut obligation, asset, borrow, now).unwrap();
    id
}
