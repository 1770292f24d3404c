use sep_40_oracle::{Asset, PriceFeedClient};
use soroban_sdk::{map, vec, Address, Env, Map, Vec};

use crate::{
    constants::{PRICE_STALENESS_THRESHOLD_S, WAD},
    errors::LendingError,
    math::Decimal,
    storage::{self, MarketConfig},
};

use super::{reserve::Reserve, treasury::ReserveTreasury};

/// An in-memory view of the market for a single operation. Reserves and treasuries are
/// staged here and only written to the ledger by `store` once every check has passed.
pub struct Market {
    pub config: MarketConfig,
    reserves: Map<u32, Reserve>,
    reserves_to_store: Vec<u32>,
    treasuries: Map<Address, ReserveTreasury>,
    treasuries_changed: bool,
}

impl Market {
    /// Load the Market from the ledger
    ///
    /// ### Errors
    /// If the market was never created
    pub fn load(e: &Env) -> Result<Self, LendingError> {
        let config = storage::get_market_config(e).ok_or(LendingError::NotInitialized)?;
        Ok(Market {
            config,
            reserves: map![e],
            reserves_to_store: vec![e],
            treasuries: storage::get_treasuries(e),
            treasuries_changed: false,
        })
    }

    /// Load a Reserve from the ledger. Returns a cached version if it exists.
    ///
    /// ### Arguments
    /// * `index` - The index of the reserve
    pub fn load_reserve(&self, e: &Env, index: u32) -> Result<Reserve, LendingError> {
        if let Some(reserve) = self.reserves.get(index) {
            return Ok(reserve);
        }
        Reserve::load(e, index)
    }

    /// Load the Reserve of an underlying asset. Returns a cached version if it exists.
    ///
    /// ### Arguments
    /// * `asset` - The address of the underlying asset
    pub fn load_reserve_by_asset(&self, e: &Env, asset: &Address) -> Result<Reserve, LendingError> {
        let index = storage::get_res_list(e)
            .first_index_of(asset)
            .ok_or(LendingError::ReserveNotFound)?;
        self.load_reserve(e, index)
    }

    /// Load a Reserve, accrue its interest up to `now`, and cache it for writing.
    ///
    /// ### Arguments
    /// * `index` - The index of the reserve
    /// * `now` - The current timestamp
    pub fn load_compounded_reserve(
        &mut self,
        e: &Env,
        index: u32,
        now: u64,
    ) -> Result<Reserve, LendingError> {
        let mut reserve = self.load_reserve(e, index)?;
        reserve.compound_interest(now)?;
        self.cache_reserve(reserve.clone(), true);
        Ok(reserve)
    }

    /// Cache the updated reserve in the market.
    ///
    /// ### Arguments
    /// * `reserve` - The updated reserve
    /// * `write` - If the reserve needs to be written to the ledger
    pub fn cache_reserve(&mut self, reserve: Reserve, write: bool) {
        if !self.reserves_to_store.contains(reserve.index) && write {
            self.reserves_to_store.push_back(reserve.index);
        }
        self.reserves.set(reserve.index, reserve);
    }

    /// Load the treasury of an underlying asset.
    ///
    /// ### Arguments
    /// * `asset` - The address of the underlying asset
    pub fn load_treasury(&self, asset: &Address) -> Result<ReserveTreasury, LendingError> {
        self.treasuries
            .get(asset.clone())
            .ok_or(LendingError::ReserveNotFound)
    }

    /// Cache the updated treasury in the market. Treasuries are always written.
    ///
    /// ### Arguments
    /// * `treasury` - The updated treasury
    pub fn cache_treasury(&mut self, treasury: ReserveTreasury) {
        self.treasuries.set(treasury.asset.clone(), treasury);
        self.treasuries_changed = true;
    }

    /// Store the cached reserves and treasuries to the ledger.
    ///
    /// ### Errors
    /// If a reserve being written disagrees with its treasury
    pub fn store(&self, e: &Env) -> Result<(), LendingError> {
        for index in self.reserves_to_store.iter() {
            let reserve = self.reserves.get_unchecked(index);
            self.load_treasury(&reserve.asset)?
                .require_in_sync(&reserve)?;
        }
        for index in self.reserves_to_store.iter() {
            self.reserves.get_unchecked(index).store(e);
        }
        if self.treasuries_changed {
            storage::set_treasuries(e, &self.treasuries);
        }
        Ok(())
    }

    /// Load a price for an asset from the market's oracle, normalized to a WAD decimal.
    ///
    /// Returns (price, price timestamp)
    ///
    /// ### Arguments
    /// * `asset` - The address of the underlying asset
    /// * `now` - The current timestamp
    ///
    /// ### Errors
    /// If the oracle has no price for the asset or the price is stale
    pub fn load_price(
        &self,
        e: &Env,
        asset: &Address,
        now: u64,
    ) -> Result<(Decimal, u64), LendingError> {
        let oracle_client = PriceFeedClient::new(e, &self.config.oracle);
        let price_data = oracle_client
            .lastprice(&Asset::Stellar(asset.clone()))
            .ok_or(LendingError::StalePrice)?;
        if now.saturating_sub(price_data.timestamp) > PRICE_STALENESS_THRESHOLD_S {
            return Err(LendingError::StalePrice);
        }
        let raw_price =
            u128::try_from(price_data.price).map_err(|_| LendingError::InvalidAmount)?;
        let decimals = oracle_client.decimals();
        let scalar = 10u128
            .checked_pow(decimals)
            .ok_or(LendingError::ArithmeticOverflow)?;
        let scaled_price = raw_price
            .checked_mul(WAD)
            .ok_or(LendingError::ArithmeticOverflow)?
            / scalar;
        Ok((Decimal::from_scaled_val(scaled_price), price_data.timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils;
    use sep_40_oracle::testutils::Asset;
    use soroban_sdk::{testutils::Address as _, Symbol};

    #[test]
    fn test_reserve_cache() {
        let e = Env::default();
        e.mock_all_auths();
        testutils::set_ledger_time(&e, 1000);

        let samwise = Address::generate(&e);
        let (market, _) = testutils::create_market_with_owner(&e, &samwise);
        let asset = Address::generate(&e);
        testutils::create_reserve(&e, &market, &asset, &testutils::default_reserve_config(&e), 7);

        e.as_contract(&market, || {
            let mut market = Market::load(&e).unwrap();
            let mut reserve = market.load_reserve(&e, 0).unwrap();
            assert_eq!(reserve.asset, asset);

            reserve.available_amount = 123;
            market.cache_reserve(reserve.clone(), false);

            // cached version is returned, ledger is untouched
            let cached = market.load_reserve_by_asset(&e, &asset).unwrap();
            assert_eq!(cached.available_amount, 123);
            assert_eq!(storage::get_reserve(&e, 0).unwrap().available_amount, 0);

            // reserves not marked for writing are not stored
            market.store(&e).unwrap();
            assert_eq!(storage::get_reserve(&e, 0).unwrap().available_amount, 0);
        });
    }

    #[test]
    fn test_store_requires_treasury_in_sync() {
        let e = Env::default();
        e.mock_all_auths();
        testutils::set_ledger_time(&e, 1000);

        let samwise = Address::generate(&e);
        let (market, _) = testutils::create_market_with_owner(&e, &samwise);
        let asset = Address::generate(&e);
        testutils::create_reserve(&e, &market, &asset, &testutils::default_reserve_config(&e), 7);

        e.as_contract(&market, || {
            let mut market = Market::load(&e).unwrap();
            let mut reserve = market.load_reserve(&e, 0).unwrap();
            reserve.available_amount = 500;
            market.cache_reserve(reserve.clone(), true);
            assert_eq!(market.store(&e), Err(LendingError::TreasuryOutOfSync));
            assert_eq!(storage::get_reserve(&e, 0).unwrap().available_amount, 0);

            let mut treasury = market.load_treasury(&asset).unwrap();
            treasury.deposit(500).unwrap();
            market.cache_treasury(treasury);
            market.store(&e).unwrap();
            assert_eq!(storage::get_reserve(&e, 0).unwrap().available_amount, 500);
            assert_eq!(storage::get_treasuries(&e).get_unchecked(asset).balance, 500);
        });
    }

    #[test]
    fn test_load_missing_reserve() {
        let e = Env::default();
        e.mock_all_auths();

        let samwise = Address::generate(&e);
        let (market, _) = testutils::create_market_with_owner(&e, &samwise);

        e.as_contract(&market, || {
            let market = Market::load(&e).unwrap();
            assert_eq!(
                market.load_reserve(&e, 0),
                Err(LendingError::ReserveNotFound)
            );
            assert_eq!(
                market.load_reserve_by_asset(&e, &Address::generate(&e)),
                Err(LendingError::ReserveNotFound)
            );
            assert_eq!(
                market.load_treasury(&Address::generate(&e)),
                Err(LendingError::ReserveNotFound)
            );
        });
    }

    #[test]
    fn test_load_uninitialized_market() {
        let e = Env::default();
        let market = testutils::create_market(&e);

        e.as_contract(&market, || {
            assert!(matches!(
                Market::load(&e),
                Err(LendingError::NotInitialized)
            ));
        });
    }

    #[test]
    fn test_load_price() {
        let e = Env::default();
        e.mock_all_auths_allowing_non_root_auth();
        testutils::set_ledger_time(&e, 1000);

        let samwise = Address::generate(&e);
        let asset_0 = Address::generate(&e);
        let asset_1 = Address::generate(&e);
        let (market, oracle_client) = testutils::create_market_with_owner(&e, &samwise);
        oracle_client.set_data(
            &samwise,
            &Asset::Other(Symbol::new(&e, "USD")),
            &vec![
                &e,
                Asset::Stellar(asset_0.clone()),
                Asset::Stellar(asset_1.clone()),
            ],
            &7,
            &300,
        );
        oracle_client.set_price_stable(&vec![&e, 1_0000000, 2_5000000]);

        e.as_contract(&market, || {
            let market = Market::load(&e).unwrap();

            let (price, timestamp) = market.load_price(&e, &asset_0, 1000).unwrap();
            assert_eq!(price, Decimal::one());
            assert_eq!(timestamp, 1000);

            let (price, _) = market.load_price(&e, &asset_1, 1000).unwrap();
            assert_eq!(price, Decimal::from_percent(250));
        });
    }

    #[test]
    fn test_load_price_stale() {
        let e = Env::default();
        e.mock_all_auths_allowing_non_root_auth();
        testutils::set_ledger_time(&e, 1000);

        let samwise = Address::generate(&e);
        let asset = Address::generate(&e);
        let (market, oracle_client) = testutils::create_market_with_owner(&e, &samwise);
        oracle_client.set_data(
            &samwise,
            &Asset::Other(Symbol::new(&e, "USD")),
            &vec![&e, Asset::Stellar(asset.clone())],
            &7,
            &300,
        );
        oracle_client.set_price(&vec![&e, 1_0000000], &900);

        e.as_contract(&market, || {
            let market = Market::load(&e).unwrap();
            assert_eq!(
                market.load_price(&e, &asset, 1000),
                Err(LendingError::StalePrice)
            );
            assert!(market.load_price(&e, &asset, 960).is_ok());
        });
    }
}
