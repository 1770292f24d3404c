use soroban_sdk::{Address, Env};

use crate::errors::LendingError;

use super::{market::Market, obligation::Obligation};

/// Grants the holder administration of a market. Only produced after the recorded
/// market owner authorized the invocation.
#[derive(Debug)]
pub struct MarketOwnerCap {
    market: Address,
}

impl MarketOwnerCap {
    /// Require the market owner to authorize the invocation and issue a capability
    /// bound to the current market
    pub fn authorize(e: &Env, market: &Market) -> Self {
        market.config.owner.require_auth();
        MarketOwnerCap {
            market: e.current_contract_address(),
        }
    }

    /// ### Errors
    /// If the capability was issued for a different market
    pub fn require_market(&self, e: &Env) -> Result<(), LendingError> {
        if self.market != e.current_contract_address() {
            return Err(LendingError::InvalidCapability);
        }
        Ok(())
    }
}

/// Grants the holder control over a single obligation. Only produced after the
/// obligation owner authorized the invocation.
#[derive(Debug)]
pub struct ObligationOwnerCap {
    obligation_id: u64,
}

impl ObligationOwnerCap {
    /// Require the obligation owner to authorize the invocation and issue a capability
    /// bound to the obligation
    pub fn authorize(obligation: &Obligation) -> Self {
        obligation.owner.require_auth();
        ObligationOwnerCap {
            obligation_id: obligation.id,
        }
    }

    /// ### Errors
    /// If the capability was issued for a different obligation
    pub fn require_obligation(&self, obligation: &Obligation) -> Result<(), LendingError> {
        if self.obligation_id != obligation.id {
            return Err(LendingError::InvalidCapability);
        }
        Ok(())
    }
}
