#![cfg(test)]
use lending_market::{Decimal, LendingError};
use soroban_sdk::{
    testutils::{Address as _, MockAuth, MockAuthInvoke},
    vec, Address, IntoVal,
};

mod common;
use crate::common::{default_reserve_config, TestFixture, ONE};

#[test]
fn test_initialize_twice() {
    let fixture = TestFixture::create();
    let oracle = Address::generate(&fixture.env);

    let result = fixture.market.try_initialize(&fixture.owner, &oracle);
    assert_eq!(result, Err(Ok(LendingError::ProofAlreadyConsumed)));

    let config = fixture.market.get_market_config();
    assert_eq!(config.owner, fixture.owner);
    assert_ne!(config.oracle, oracle);
}

#[test]
fn test_add_reserve_twice() {
    let fixture = TestFixture::create();
    let result = fixture.market.try_add_reserve(
        &fixture.asset,
        &default_reserve_config(&fixture.env),
        &7,
        &Decimal::one(),
    );
    assert_eq!(result, Err(Ok(LendingError::ReserveAlreadyExists)));
    assert_eq!(
        fixture.market.get_reserve_list(),
        vec![&fixture.env, fixture.asset.clone()]
    );
}

#[test]
fn test_borrow_against_collateral() {
    let fixture = TestFixture::create();
    let frodo = Address::generate(&fixture.env);
    let sam = Address::generate(&fixture.env);

    let frodo_id = fixture.create_collateralized_obligation(&frodo, 1_000 * ONE);
    let sam_id = fixture.create_collateralized_obligation(&sam, 1_000 * ONE);

    // half of the deposit value can be borrowed
    let debt = fixture.market.borrow(&frodo_id, &fixture.asset, &(250 * ONE));
    assert_eq!(debt, Decimal::from(250 * ONE));
    assert_eq!(fixture.token.balance(&frodo), (250 * ONE) as i128);

    let obligation = fixture.market.get_obligation(&frodo_id);
    assert_eq!(obligation.deposited_value_usd, Decimal::from(1_000u64));
    assert_eq!(obligation.allowed_borrow_value_usd, Decimal::from(500u64));
    assert_eq!(obligation.unweighted_borrowed_value_usd, Decimal::from(250u64));

    // a borrow over the allowed value leaves everything untouched
    let reserve_before = fixture.market.get_reserve(&fixture.asset);
    let sam_before = fixture.market.get_obligation(&sam_id);
    let result = fixture.market.try_borrow(&sam_id, &fixture.asset, &(600 * ONE));
    assert_eq!(result, Err(Ok(LendingError::ExceedsAllowedBorrow)));
    assert_eq!(fixture.market.get_reserve(&fixture.asset), reserve_before);
    assert_eq!(fixture.market.get_obligation(&sam_id), sam_before);
    assert_eq!(fixture.token.balance(&sam), 0);
}

#[test]
fn test_withdraw_collateral_limits() {
    let fixture = TestFixture::create();
    let frodo = Address::generate(&fixture.env);
    let id = fixture.create_collateralized_obligation(&frodo, 1_000 * ONE);
    fixture.market.borrow(&id, &fixture.asset, &(250 * ONE));

    // 500 of collateral backs the 250 borrow at 50% open ltv
    let result = fixture.market.try_withdraw(&id, &fixture.asset, &(501 * ONE));
    assert_eq!(result, Err(Ok(LendingError::BelowRequiredCollateral)));

    let withdrawn = fixture.market.withdraw(&id, &fixture.asset, &(500 * ONE));
    assert_eq!(withdrawn, 500 * ONE);
    assert_eq!(
        fixture.market.get_ctoken_balance(&frodo, &fixture.asset),
        500 * ONE
    );

    let redeemed = fixture.market.redeem_ctokens_and_withdraw_liquidity(
        &frodo,
        &fixture.asset,
        &(500 * ONE),
    );
    assert_eq!(redeemed, 500 * ONE);
    assert_eq!(fixture.token.balance(&frodo), (750 * ONE) as i128);
}

#[test]
fn test_stale_price_blocks_borrow() {
    let fixture = TestFixture::create();
    let frodo = Address::generate(&fixture.env);
    let id = fixture.create_collateralized_obligation(&frodo, 1_000 * ONE);

    fixture.jump(61);
    let obligation_before = fixture.market.get_obligation(&id);
    let result = fixture.market.try_borrow(&id, &fixture.asset, &(100 * ONE));
    assert_eq!(result, Err(Ok(LendingError::StalePrice)));
    assert_eq!(fixture.market.get_obligation(&id), obligation_before);

    // an oracle update makes the reserve usable again
    fixture
        .oracle
        .set_price_stable(&vec![&fixture.env, 2_0000000i128]);
    let price = fixture.market.refresh_reserve_price(&fixture.asset);
    assert_eq!(price, Decimal::from(2u64));

    fixture.market.borrow(&id, &fixture.asset, &(100 * ONE));
    let obligation = fixture.market.get_obligation(&id);
    assert_eq!(obligation.deposited_value_usd, Decimal::from(2_000u64));
    assert_eq!(obligation.unweighted_borrowed_value_usd, Decimal::from(200u64));
}

#[test]
fn test_stale_price_blocks_withdraw() {
    let fixture = TestFixture::create();
    let frodo = Address::generate(&fixture.env);
    let id = fixture.create_collateralized_obligation(&frodo, 1_000 * ONE);
    fixture.market.borrow(&id, &fixture.asset, &(250 * ONE));

    fixture.jump(61);
    let obligation_before = fixture.market.get_obligation(&id);
    let reserve_before = fixture.market.get_reserve(&fixture.asset);
    let result = fixture.market.try_withdraw(&id, &fixture.asset, &(100 * ONE));
    assert_eq!(result, Err(Ok(LendingError::StalePrice)));
    assert_eq!(fixture.market.get_obligation(&id), obligation_before);
    assert_eq!(fixture.market.get_reserve(&fixture.asset), reserve_before);
    assert_eq!(fixture.market.get_ctoken_balance(&frodo, &fixture.asset), 0);
}

#[test]
fn test_stale_price_blocks_liquidation() {
    let fixture = TestFixture::create();
    let frodo = Address::generate(&fixture.env);
    let merry = Address::generate(&fixture.env);
    let id = fixture.create_collateralized_obligation(&frodo, 1_000 * ONE);
    fixture.market.borrow(&id, &fixture.asset, &(250 * ONE));

    let mut config = default_reserve_config(&fixture.env);
    config.open_ltv_pct = 0;
    config.close_ltv_pct = 0;
    fixture.market.update_reserve_config(&fixture.asset, &config);
    fixture.token.mint(&merry, &((100 * ONE) as i128));

    fixture.jump(61);
    let obligation_before = fixture.market.get_obligation(&id);
    let reserve_before = fixture.market.get_reserve(&fixture.asset);
    let result = fixture
        .market
        .try_liquidate(&merry, &id, &fixture.asset, &(100 * ONE), &fixture.asset);
    assert_eq!(result, Err(Ok(LendingError::StalePrice)));
    assert_eq!(fixture.market.get_obligation(&id), obligation_before);
    assert_eq!(fixture.market.get_reserve(&fixture.asset), reserve_before);
    assert_eq!(fixture.token.balance(&merry), (100 * ONE) as i128);
    assert_eq!(fixture.market.get_ctoken_balance(&merry, &fixture.asset), 0);
}

#[test]
fn test_deposit_ctokens_into_obligation_requires_owner() {
    let fixture = TestFixture::create();
    let frodo = Address::generate(&fixture.env);
    let merry = Address::generate(&fixture.env);
    let id = fixture.create_collateralized_obligation(&frodo, 1_000 * ONE);

    fixture.token.mint(&merry, &((10 * ONE) as i128));
    let ctokens = fixture
        .market
        .deposit_liquidity_and_mint_ctokens(&merry, &fixture.asset, &(10 * ONE));

    // merry signs for their own ctokens but frodo never authorizes the deposit
    let obligation_before = fixture.market.get_obligation(&id);
    let result = fixture
        .market
        .mock_auths(&[MockAuth {
            address: &merry,
            invoke: &MockAuthInvoke {
                contract: &fixture.market.address,
                fn_name: "deposit_ctokens_into_obligation",
                args: (merry.clone(), id, fixture.asset.clone(), ctokens).into_val(&fixture.env),
                sub_invokes: &[],
            },
        }])
        .try_deposit_ctokens_into_obligation(&merry, &id, &fixture.asset, &ctokens);
    assert!(result.is_err());
    assert_eq!(fixture.market.get_obligation(&id), obligation_before);
    assert_eq!(
        fixture.market.get_ctoken_balance(&merry, &fixture.asset),
        ctokens
    );
}

#[test]
fn test_ctoken_ratio_grows_with_interest() {
    let fixture = TestFixture::create();
    let frodo = Address::generate(&fixture.env);
    let sam = Address::generate(&fixture.env);

    fixture.token.mint(&sam, &((1_000 * ONE) as i128));
    let ctokens = fixture.market.deposit_liquidity_and_mint_ctokens(
        &sam,
        &fixture.asset,
        &(1_000 * ONE),
    );
    assert_eq!(ctokens, 1_000 * ONE);

    let id = fixture.create_collateralized_obligation(&frodo, 1_000 * ONE);
    fixture.market.borrow(&id, &fixture.asset, &(500 * ONE));

    fixture.jump(31536000);
    let redeemed =
        fixture
            .market
            .redeem_ctokens_and_withdraw_liquidity(&sam, &fixture.asset, &ctokens);
    assert!(redeemed > 1_000 * ONE);
    assert_eq!(fixture.market.get_ctoken_balance(&sam, &fixture.asset), 0);

    let reserve = fixture.market.get_reserve(&fixture.asset);
    assert!(reserve.cumulative_borrow_rate > Decimal::one());
    assert!(reserve.borrowed_amount > Decimal::from(500 * ONE));
}

#[test]
fn test_repay_is_clamped_to_debt() {
    let fixture = TestFixture::create();
    let frodo = Address::generate(&fixture.env);
    let sam = Address::generate(&fixture.env);
    let id = fixture.create_collateralized_obligation(&frodo, 1_000 * ONE);
    fixture.market.borrow(&id, &fixture.asset, &(100 * ONE));

    fixture.token.mint(&sam, &((500 * ONE) as i128));
    let paid = fixture.market.repay(&sam, &id, &fixture.asset, &(500 * ONE));
    assert_eq!(paid, 100 * ONE);
    assert_eq!(fixture.token.balance(&sam), (400 * ONE) as i128);

    let obligation = fixture.market.get_obligation(&id);
    assert_eq!(obligation.borrows.len(), 0);

    let result = fixture.market.try_repay(&sam, &id, &fixture.asset, &ONE);
    assert_eq!(result, Err(Ok(LendingError::BorrowNotFound)));
}

#[test]
fn test_liquidation() {
    let fixture = TestFixture::create();
    let mut config = default_reserve_config(&fixture.env);
    config.liquidation_fee_bps = 2_000;
    fixture.market.update_reserve_config(&fixture.asset, &config);
    let frodo = Address::generate(&fixture.env);
    let merry = Address::generate(&fixture.env);
    let id = fixture.create_collateralized_obligation(&frodo, 1_000 * ONE);
    fixture.market.borrow(&id, &fixture.asset, &(250 * ONE));

    let result = fixture
        .market
        .try_liquidate(&merry, &id, &fixture.asset, &(10 * ONE), &fixture.asset);
    assert_eq!(result, Err(Ok(LendingError::NotLiquidatable)));

    // the owner marks the collateral as worthless for borrowing
    config.open_ltv_pct = 0;
    config.close_ltv_pct = 0;
    fixture.market.update_reserve_config(&fixture.asset, &config);

    fixture.token.mint(&merry, &((100 * ONE) as i128));
    let result = fixture
        .market
        .liquidate(&merry, &id, &fixture.asset, &(100 * ONE), &fixture.asset);

    // 20% of the 250 debt can be closed for 5% bonus collateral, a fifth of which is the fee
    assert_eq!(result.repaid, 50 * ONE);
    assert_eq!(result.protocol_ctokens, ONE / 2);
    assert_eq!(result.seized_ctokens, 52 * ONE);
    assert_eq!(fixture.token.balance(&merry), (50 * ONE) as i128);
    assert_eq!(
        fixture.market.get_ctoken_balance(&merry, &fixture.asset),
        52 * ONE
    );

    let obligation = fixture.market.get_obligation(&id);
    assert_eq!(obligation.deposits.get_unchecked(0).ctoken_amount, 947_5000000);
    assert_eq!(
        obligation.borrows.get_unchecked(0).borrowed_amount,
        Decimal::from(200 * ONE)
    );

    // the liquidator redeems the seized collateral
    let redeemed = fixture.market.redeem_ctokens_and_withdraw_liquidity(
        &merry,
        &fixture.asset,
        &(52 * ONE),
    );
    assert_eq!(redeemed, 52 * ONE);
}

#[test]
fn test_claim_fees() {
    let fixture = TestFixture::create();
    let mut config = default_reserve_config(&fixture.env);
    config.borrow_fee_bps = 100;
    fixture.market.update_reserve_config(&fixture.asset, &config);
    let frodo = Address::generate(&fixture.env);
    let treasurer = Address::generate(&fixture.env);
    let id = fixture.create_collateralized_obligation(&frodo, 1_000 * ONE);

    let debt = fixture.market.borrow(&id, &fixture.asset, &(100 * ONE));
    assert_eq!(debt, Decimal::from(101 * ONE));

    // fees are only claimable once they are back in the reserve
    fixture.token.mint(&frodo, &(ONE as i128));
    fixture.market.repay(&frodo, &id, &fixture.asset, &(101 * ONE));

    let claimed = fixture.market.claim_fees(&fixture.asset, &treasurer);
    assert_eq!(claimed, ONE);
    assert_eq!(fixture.token.balance(&treasurer), ONE as i128);

    let reserve = fixture.market.get_reserve(&fixture.asset);
    assert_eq!(reserve.fees_accumulated, Decimal::zero());
    assert_eq!(reserve.available_amount, 1_000 * ONE);
}
