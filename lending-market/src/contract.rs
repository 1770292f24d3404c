use crate::{
    errors::LendingError,
    market::{
        self, LiquidationResult, Market, MarketOwnerCap, Obligation, ObligationOwnerCap, Reserve,
        ReserveConfig,
    },
    math::Decimal,
    storage::{self, MarketConfig},
};
use soroban_sdk::{contract, contractclient, contractimpl, Address, Env, Symbol, Vec};

/// ### LendingMarket
///
/// A pooled money market where obligations borrow against ctoken collateral.
#[contract]
pub struct LendingMarketContract;

#[contractclient(name = "LendingMarketClient")]
pub trait LendingMarket {
    /// Initialize the market
    ///
    /// ### Arguments
    /// * `owner` - The Address of the market owner
    /// * `oracle` - The contract address of the SEP-40 price feed
    ///
    /// ### Errors
    /// If the market was already initialized
    fn initialize(e: Env, owner: Address, oracle: Address) -> Result<(), LendingError>;

    /// (Owner only) Add a reserve to the market
    ///
    /// Returns the index of the reserve
    ///
    /// ### Arguments
    /// * `asset` - The underlying asset of the reserve
    /// * `config` - The ReserveConfig for the reserve
    /// * `mint_decimals` - The decimals of the underlying asset
    /// * `initial_price` - The USD price of one whole token
    ///
    /// ### Errors
    /// If the asset already has a reserve, the market is full, or the config is invalid
    fn add_reserve(
        e: Env,
        asset: Address,
        config: ReserveConfig,
        mint_decimals: u32,
        initial_price: Decimal,
    ) -> Result<u32, LendingError>;

    /// (Owner only) Update the configuration of a reserve
    ///
    /// ### Arguments
    /// * `asset` - The underlying asset of the reserve
    /// * `config` - The new ReserveConfig
    ///
    /// ### Errors
    /// If the reserve does not exist or the config is invalid
    fn update_reserve_config(
        e: Env,
        asset: Address,
        config: ReserveConfig,
    ) -> Result<(), LendingError>;

    /// Pull the latest price of a reserve from the oracle
    ///
    /// Returns the new price
    ///
    /// ### Errors
    /// If the reserve does not exist or the oracle price is stale
    fn refresh_reserve_price(e: Env, asset: Address) -> Result<Decimal, LendingError>;

    /// (Owner only) Transfer the claimable protocol fees of a reserve
    ///
    /// Returns the amount of underlying tokens transferred
    ///
    /// ### Arguments
    /// * `asset` - The underlying asset of the reserve
    /// * `to` - The Address receiving the fees
    fn claim_fees(e: Env, asset: Address, to: Address) -> Result<u64, LendingError>;

    /// Create an empty obligation
    ///
    /// Returns the id of the obligation
    ///
    /// ### Arguments
    /// * `owner` - The Address that will control the obligation
    fn create_obligation(e: Env, owner: Address) -> Result<u64, LendingError>;

    /// Deposit underlying tokens into a reserve in exchange for ctokens
    ///
    /// Returns the amount of ctokens minted to `from`
    ///
    /// ### Arguments
    /// * `from` - The Address supplying the tokens
    /// * `asset` - The underlying asset of the reserve
    /// * `amount` - The amount of underlying tokens
    ///
    /// ### Errors
    /// If the amount is zero or the deposit limit would be exceeded
    fn deposit_liquidity_and_mint_ctokens(
        e: Env,
        from: Address,
        asset: Address,
        amount: u64,
    ) -> Result<u64, LendingError>;

    /// Redeem ctokens for the underlying tokens they are worth
    ///
    /// Returns the amount of underlying tokens transferred to `from`
    ///
    /// ### Arguments
    /// * `from` - The Address holding the ctokens
    /// * `asset` - The underlying asset of the reserve
    /// * `ctokens` - The amount of ctokens to redeem
    ///
    /// ### Errors
    /// If `from` holds too few ctokens or the reserve lacks available liquidity
    fn redeem_ctokens_and_withdraw_liquidity(
        e: Env,
        from: Address,
        asset: Address,
        ctokens: u64,
    ) -> Result<u64, LendingError>;

    /// (Obligation owner only) Move ctokens held by `from` into an obligation as collateral
    ///
    /// ### Arguments
    /// * `from` - The Address holding the ctokens
    /// * `obligation_id` - The obligation receiving the collateral
    /// * `asset` - The underlying asset of the reserve
    /// * `ctokens` - The amount of ctokens to deposit
    ///
    /// ### Errors
    /// If the obligation owner did not authorize the invocation
    fn deposit_ctokens_into_obligation(
        e: Env,
        from: Address,
        obligation_id: u64,
        asset: Address,
        ctokens: u64,
    ) -> Result<(), LendingError>;

    /// (Obligation owner only) Borrow against an obligation
    ///
    /// Returns the debt added to the obligation, including the borrow fee
    ///
    /// ### Errors
    /// If the borrow would exceed the allowed borrow value of the obligation
    fn borrow(
        e: Env,
        obligation_id: u64,
        asset: Address,
        amount: u64,
    ) -> Result<Decimal, LendingError>;

    /// (Obligation owner only) Withdraw collateral from an obligation as free ctokens
    ///
    /// Returns the amount of ctokens withdrawn
    ///
    /// ### Errors
    /// If the withdrawal would leave the obligation below its required collateral
    fn withdraw(
        e: Env,
        obligation_id: u64,
        asset: Address,
        ctokens: u64,
    ) -> Result<u64, LendingError>;

    /// Repay debt of an obligation
    ///
    /// Returns the amount of underlying tokens transferred from `from`
    ///
    /// ### Arguments
    /// * `from` - The Address paying the debt
    /// * `obligation_id` - The obligation being repaid
    /// * `asset` - The underlying asset of the debt
    /// * `amount` - The maximum amount of underlying tokens to repay
    fn repay(
        e: Env,
        from: Address,
        obligation_id: u64,
        asset: Address,
        amount: u64,
    ) -> Result<u64, LendingError>;

    /// Liquidate an unhealthy obligation
    ///
    /// ### Arguments
    /// * `liquidator` - The Address repaying the debt and receiving the collateral
    /// * `obligation_id` - The obligation being liquidated
    /// * `repay_asset` - The underlying asset of the debt being repaid
    /// * `repay_amount` - The maximum amount of debt to repay
    /// * `withdraw_asset` - The underlying asset of the collateral being seized
    ///
    /// ### Errors
    /// If the obligation is not liquidatable
    fn liquidate(
        e: Env,
        liquidator: Address,
        obligation_id: u64,
        repay_asset: Address,
        repay_amount: u64,
        withdraw_asset: Address,
    ) -> Result<LiquidationResult, LendingError>;

    /********* Views **********/

    /// Fetch the market config
    fn get_market_config(e: Env) -> Result<MarketConfig, LendingError>;

    /// Fetch the market owner
    fn get_owner(e: Env) -> Result<Address, LendingError>;

    /// Fetch the assets of the market in reserve index order
    fn get_reserve_list(e: Env) -> Vec<Address>;

    /// Fetch the reserve of an asset
    fn get_reserve(e: Env, asset: Address) -> Result<Reserve, LendingError>;

    /// Fetch an obligation
    fn get_obligation(e: Env, obligation_id: u64) -> Result<Obligation, LendingError>;

    /// Fetch the free ctokens `user` holds for a reserve
    fn get_ctoken_balance(e: Env, user: Address, asset: Address) -> Result<u64, LendingError>;
}

#[contractimpl]
impl LendingMarket for LendingMarketContract {
    fn initialize(e: Env, owner: Address, oracle: Address) -> Result<(), LendingError> {
        storage::extend_instance(&e);

        market::execute_create_market(&e, &owner, &oracle)?;

        e.events()
            .publish((Symbol::new(&e, "initialize"), owner), oracle);
        Ok(())
    }

    fn add_reserve(
        e: Env,
        asset: Address,
        config: ReserveConfig,
        mint_decimals: u32,
        initial_price: Decimal,
    ) -> Result<u32, LendingError> {
        storage::extend_instance(&e);
        let mut market = Market::load(&e)?;
        let cap = MarketOwnerCap::authorize(&e, &market);

        let index = market::execute_add_reserve(
            &e,
            &mut market,
            &cap,
            &asset,
            config,
            mint_decimals,
            initial_price,
            e.ledger().timestamp(),
        )?;

        e.events().publish(
            (Symbol::new(&e, "add_reserve"), market.config.owner),
            (asset, index),
        );
        Ok(index)
    }

    fn update_reserve_config(
        e: Env,
        asset: Address,
        config: ReserveConfig,
    ) -> Result<(), LendingError> {
        storage::extend_instance(&e);
        let mut market = Market::load(&e)?;
        let cap = MarketOwnerCap::authorize(&e, &market);

        market::execute_update_reserve_config(
            &e,
            &mut market,
            &cap,
            &asset,
            config,
            e.ledger().timestamp(),
        )?;

        e.events().publish(
            (Symbol::new(&e, "update_reserve_config"), market.config.owner),
            asset,
        );
        Ok(())
    }

    fn refresh_reserve_price(e: Env, asset: Address) -> Result<Decimal, LendingError> {
        storage::extend_instance(&e);
        let mut market = Market::load(&e)?;

        let price =
            market::execute_refresh_reserve_price(&e, &mut market, &asset, e.ledger().timestamp())?;

        e.events()
            .publish((Symbol::new(&e, "refresh_reserve_price"), asset), price);
        Ok(price)
    }

    fn claim_fees(e: Env, asset: Address, to: Address) -> Result<u64, LendingError> {
        storage::extend_instance(&e);
        let mut market = Market::load(&e)?;
        let cap = MarketOwnerCap::authorize(&e, &market);

        let claimed = market::execute_claim_fees(
            &e,
            &mut market,
            &cap,
            &asset,
            &to,
            e.ledger().timestamp(),
        )?;

        e.events()
            .publish((Symbol::new(&e, "claim_fees"), asset), (to, claimed));
        Ok(claimed)
    }

    fn create_obligation(e: Env, owner: Address) -> Result<u64, LendingError> {
        storage::extend_instance(&e);
        owner.require_auth();

        let obligation_id = market::execute_create_obligation(&e, &owner)?;

        e.events()
            .publish((Symbol::new(&e, "create_obligation"), owner), obligation_id);
        Ok(obligation_id)
    }

    fn deposit_liquidity_and_mint_ctokens(
        e: Env,
        from: Address,
        asset: Address,
        amount: u64,
    ) -> Result<u64, LendingError> {
        storage::extend_instance(&e);
        from.require_auth();
        let mut market = Market::load(&e)?;

        let minted = market::execute_deposit_liquidity_and_mint_ctokens(
            &e,
            &mut market,
            &from,
            &asset,
            amount,
            e.ledger().timestamp(),
        )?;

        e.events().publish(
            (Symbol::new(&e, "deposit_liquidity"), asset, from),
            (amount, minted),
        );
        Ok(minted)
    }

    fn redeem_ctokens_and_withdraw_liquidity(
        e: Env,
        from: Address,
        asset: Address,
        ctokens: u64,
    ) -> Result<u64, LendingError> {
        storage::extend_instance(&e);
        from.require_auth();
        let mut market = Market::load(&e)?;

        let liquidity = market::execute_redeem_ctokens_and_withdraw_liquidity(
            &e,
            &mut market,
            &from,
            &asset,
            ctokens,
            e.ledger().timestamp(),
        )?;

        e.events().publish(
            (Symbol::new(&e, "redeem_ctokens"), asset, from),
            (ctokens, liquidity),
        );
        Ok(liquidity)
    }

    fn deposit_ctokens_into_obligation(
        e: Env,
        from: Address,
        obligation_id: u64,
        asset: Address,
        ctokens: u64,
    ) -> Result<(), LendingError> {
        storage::extend_instance(&e);
        let market = Market::load(&e)?;
        let mut obligation = Obligation::load(&e, obligation_id)?;
        if from != obligation.owner {
            from.require_auth();
        }
        let cap = ObligationOwnerCap::authorize(&obligation);

        market::execute_deposit_ctokens_into_obligation(
            &e,
            &market,
            &cap,
            &from,
            &mut obligation,
            &asset,
            ctokens,
        )?;

        e.events().publish(
            (Symbol::new(&e, "deposit_collateral"), asset, from),
            (obligation_id, ctokens),
        );
        Ok(())
    }

    fn borrow(
        e: Env,
        obligation_id: u64,
        asset: Address,
        amount: u64,
    ) -> Result<Decimal, LendingError> {
        storage::extend_instance(&e);
        let mut market = Market::load(&e)?;
        let mut obligation = Obligation::load(&e, obligation_id)?;
        let cap = ObligationOwnerCap::authorize(&obligation);

        let debt = market::execute_borrow(
            &e,
            &mut market,
            &cap,
            &mut obligation,
            &asset,
            amount,
            e.ledger().timestamp(),
        )?;

        e.events().publish(
            (Symbol::new(&e, "borrow"), asset, obligation.owner),
            (obligation_id, amount, debt),
        );
        Ok(debt)
    }

    fn withdraw(
        e: Env,
        obligation_id: u64,
        asset: Address,
        ctokens: u64,
    ) -> Result<u64, LendingError> {
        storage::extend_instance(&e);
        let mut market = Market::load(&e)?;
        let mut obligation = Obligation::load(&e, obligation_id)?;
        let cap = ObligationOwnerCap::authorize(&obligation);

        let withdrawn = market::execute_withdraw(
            &e,
            &mut market,
            &cap,
            &mut obligation,
            &asset,
            ctokens,
            e.ledger().timestamp(),
        )?;

        e.events().publish(
            (Symbol::new(&e, "withdraw_collateral"), asset, obligation.owner),
            (obligation_id, withdrawn),
        );
        Ok(withdrawn)
    }

    fn repay(
        e: Env,
        from: Address,
        obligation_id: u64,
        asset: Address,
        amount: u64,
    ) -> Result<u64, LendingError> {
        storage::extend_instance(&e);
        from.require_auth();
        let mut market = Market::load(&e)?;
        let mut obligation = Obligation::load(&e, obligation_id)?;

        let paid = market::execute_repay(
            &e,
            &mut market,
            &from,
            &mut obligation,
            &asset,
            amount,
            e.ledger().timestamp(),
        )?;

        e.events().publish(
            (Symbol::new(&e, "repay"), asset, from),
            (obligation_id, paid),
        );
        Ok(paid)
    }

    fn liquidate(
        e: Env,
        liquidator: Address,
        obligation_id: u64,
        repay_asset: Address,
        repay_amount: u64,
        withdraw_asset: Address,
    ) -> Result<LiquidationResult, LendingError> {
        storage::extend_instance(&e);
        liquidator.require_auth();
        let mut market = Market::load(&e)?;
        let mut obligation = Obligation::load(&e, obligation_id)?;

        let result = market::execute_liquidate(
            &e,
            &mut market,
            &liquidator,
            &mut obligation,
            &repay_asset,
            repay_amount,
            &withdraw_asset,
            e.ledger().timestamp(),
        )?;

        e.events().publish(
            (Symbol::new(&e, "liquidate"), liquidator, obligation_id),
            (repay_asset, withdraw_asset, result.clone()),
        );
        Ok(result)
    }

    /********* Views **********/

    fn get_market_config(e: Env) -> Result<MarketConfig, LendingError> {
        storage::get_market_config(&e).ok_or(LendingError::NotInitialized)
    }

    fn get_owner(e: Env) -> Result<Address, LendingError> {
        Ok(Market::load(&e)?.config.owner)
    }

    fn get_reserve_list(e: Env) -> Vec<Address> {
        storage::get_res_list(&e)
    }

    fn get_reserve(e: Env, asset: Address) -> Result<Reserve, LendingError> {
        Market::load(&e)?.load_reserve_by_asset(&e, &asset)
    }

    fn get_obligation(e: Env, obligation_id: u64) -> Result<Obligation, LendingError> {
        Obligation::load(&e, obligation_id)
    }

    fn get_ctoken_balance(e: Env, user: Address, asset: Address) -> Result<u64, LendingError> {
        let reserve = Market::load(&e)?.load_reserve_by_asset(&e, &asset)?;
        Ok(storage::get_ctoken_balance(&e, &user, reserve.index))
    }
}
