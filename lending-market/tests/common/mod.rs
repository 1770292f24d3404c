#![allow(dead_code)]

use lending_market::{
    Decimal, InterestRateCurve, LendingMarketClient, LendingMarketContract, ReserveConfig,
};
use sep_40_oracle::testutils::{Asset, MockPriceOracleClient, MockPriceOracleWASM};
use sep_41_token::testutils::{MockTokenClient, MockTokenWASM};
use soroban_sdk::{
    testutils::{Address as _, Ledger, LedgerInfo},
    vec, Address, Env, IntoVal, Symbol,
};

/// One whole token with 7 decimals
pub const ONE: u64 = 1_0000000;

pub fn set_ledger_time(e: &Env, timestamp: u64) {
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

pub fn create_token<'a>(e: &Env, admin: &Address) -> (Address, MockTokenClient<'a>) {
    let contract_address = Address::generate(e);
    e.register_contract_wasm(&contract_address, MockTokenWASM);
    let client = MockTokenClient::new(e, &contract_address);
    client.initialize(admin, &7, &"unit".into_val(e), &"test".into_val(e));
    (contract_address, client)
}

/// Create an oracle quoting `assets` in USD with 7 decimals, all priced at 1.0
pub fn create_oracle<'a>(
    e: &Env,
    admin: &Address,
    assets: &[Address],
) -> (Address, MockPriceOracleClient<'a>) {
    let contract_address = e.register_contract_wasm(None, MockPriceOracleWASM);
    let client = MockPriceOracleClient::new(e, &contract_address);
    let mut feed_assets = vec![e];
    let mut prices = vec![e];
    for asset in assets {
        feed_assets.push_back(Asset::Stellar(asset.clone()));
        prices.push_back(1_0000000i128);
    }
    client.set_data(
        admin,
        &Asset::Other(Symbol::new(e, "USD")),
        &feed_assets,
        &7,
        &300,
    );
    client.set_price_stable(&prices);
    (contract_address, client)
}

pub fn default_reserve_config(e: &Env) -> ReserveConfig {
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

pub struct TestFixture<'a> {
    pub env: Env,
    pub owner: Address,
    pub market: LendingMarketClient<'a>,
    pub oracle: MockPriceOracleClient<'a>,
    pub asset: Address,
    pub token: MockTokenClient<'a>,
}

impl TestFixture<'_> {
    /// Create an initialized market with a single 7 decimal reserve priced at 1.0
    pub fn create<'a>() -> TestFixture<'a> {
        let e = Env::default();
        e.mock_all_auths();
        e.budget().reset_unlimited();
        set_ledger_time(&e, 1_000);

        let owner = Address::generate(&e);
        let (asset, token) = create_token(&e, &owner);
        let (oracle_address, oracle) = create_oracle(&e, &owner, &[asset.clone()]);

        let market_address = e.register_contract(None, LendingMarketContract {});
        let market = LendingMarketClient::new(&e, &market_address);
        market.initialize(&owner, &oracle_address);

        market.add_reserve(&asset, &default_reserve_config(&e), &7, &Decimal::one());

        TestFixture {
            env: e,
            owner,
            market,
            oracle,
            asset,
            token,
        }
    }

    /// Fund `user`, supply `deposit` tokens and post all minted ctokens into a new obligation
    ///
    /// Returns the obligation id
    pub fn create_collateralized_obligation(&self, user: &Address, deposit: u64) -> u64 {
        self.token.mint(user, &(deposit as i128));
        let id = self.market.create_obligation(user);
        let ctokens = self
            .market
            .deposit_liquidity_and_mint_ctokens(user, &self.asset, &deposit);
        self.market
            .deposit_ctokens_into_obligation(user, &id, &self.asset, &ctokens);
        id
    }

    pub fn jump(&self, seconds: u64) {
        set_ledger_time(&self.env, self.env.ledger().timestamp() + seconds);
    }
}
