mod actions;
pub use actions::{
    execute_borrow, execute_create_obligation, execute_deposit_ctokens_into_obligation,
    execute_deposit_liquidity_and_mint_ctokens, execute_redeem_ctokens_and_withdraw_liquidity,
    execute_repay, execute_withdraw,
};

mod capability;
pub use capability::{MarketOwnerCap, ObligationOwnerCap};

mod config;
pub use config::{
    execute_add_reserve, execute_claim_fees, execute_create_market, execute_refresh_reserve_price,
    execute_update_reserve_config,
};

mod interest;
pub use interest::InterestRateCurve;

mod liquidation;
pub use liquidation::{execute_liquidate, LiquidationResult};

#[allow(clippy::module_inception)]
mod market;
pub use market::Market;

mod obligation;
pub use obligation::{Borrow, Deposit, Obligation};

mod reserve;
pub use reserve::{Reserve, ReserveConfig};

mod treasury;
pub use treasury::ReserveTreasury;
