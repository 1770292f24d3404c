use soroban_sdk::{contracttype, Address};

use crate::errors::LendingError;

use super::reserve::Reserve;

/// The custody half of a reserve. Tracks the underlying tokens held by the market for
/// the reserve and the ctokens issued against them.
#[derive(Clone, Debug, Eq, PartialEq)]
#[contracttype]
pub struct ReserveTreasury {
    pub asset: Address,      // the underlying asset address
    pub reserve_index: u32,  // the index of the reserve this treasury backs
    pub balance: u64,        // the underlying tokens held for the reserve
    pub ctoken_supply: u64,  // the ctokens minted by the reserve
}

impl ReserveTreasury {
    pub fn new(asset: Address, reserve_index: u32) -> Self {
        ReserveTreasury {
            asset,
            reserve_index,
            balance: 0,
            ctoken_supply: 0,
        }
    }

    /// Take custody of underlying tokens
    pub fn deposit(&mut self, amount: u64) -> Result<(), LendingError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Release underlying tokens
    ///
    /// ### Errors
    /// If the treasury holds less than `amount`
    pub fn withdraw(&mut self, amount: u64) -> Result<(), LendingError> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(LendingError::InsufficientLiquidity)?;
        Ok(())
    }

    pub fn mint_ctokens(&mut self, ctokens: u64) -> Result<(), LendingError> {
        self.ctoken_supply = self
            .ctoken_supply
            .checked_add(ctokens)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    /// ### Errors
    /// If more ctokens are burned than exist
    pub fn burn_ctokens(&mut self, ctokens: u64) -> Result<(), LendingError> {
        self.ctoken_supply = self
            .ctoken_supply
            .checked_sub(ctokens)
            .ok_or(LendingError::InsufficientCTokens)?;
        Ok(())
    }

    /// Require the treasury to agree with the accounting of its reserve
    ///
    /// ### Errors
    /// If the treasury balances do not match the reserve
    pub fn require_in_sync(&self, reserve: &Reserve) -> Result<(), LendingError> {
        if self.asset != reserve.asset
            || self.reserve_index != reserve.index
            || self.balance != reserve.available_amount
            || self.ctoken_supply != reserve.ctoken_supply
        {
            return Err(LendingError::TreasuryOutOfSync);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils;
    use soroban_sdk::{testutils::Address as _, Env};

    #[test]
    fn test_treasury_balances() {
        let e = Env::default();
        let mut treasury = ReserveTreasury::new(Address::generate(&e), 1);

        treasury.deposit(1_000).unwrap();
        treasury.mint_ctokens(900).unwrap();
        treasury.withdraw(400).unwrap();
        treasury.burn_ctokens(100).unwrap();
        assert_eq!(treasury.balance, 600);
        assert_eq!(treasury.ctoken_supply, 800);

        assert_eq!(
            treasury.withdraw(601),
            Err(LendingError::InsufficientLiquidity)
        );
        assert_eq!(
            treasury.burn_ctokens(801),
            Err(LendingError::InsufficientCTokens)
        );
        assert_eq!(treasury.balance, 600);
        assert_eq!(treasury.ctoken_supply, 800);
    }

    #[test]
    fn test_require_in_sync() {
        let e = Env::default();
        let asset = Address::generate(&e);
        let mut reserve = testutils::default_reserve(&e, 2, &asset);
        let mut treasury = ReserveTreasury::new(asset.clone(), 2);

        let minted = reserve.deposit_liquidity_and_mint_ctokens(5_000, 0).unwrap();
        treasury.deposit(5_000).unwrap();
        assert_eq!(
            treasury.require_in_sync(&reserve),
            Err(LendingError::TreasuryOutOfSync)
        );

        treasury.mint_ctokens(minted).unwrap();
        assert!(treasury.require_in_sync(&reserve).is_ok());

        let other = ReserveTreasury {
            asset: Address::generate(&e),
            reserve_index: 2,
            balance: 5_000,
            ctoken_supply: minted,
        };
        assert_eq!(
            other.require_in_sync(&reserve),
            Err(LendingError::TreasuryOutOfSync)
        );
    }
}
