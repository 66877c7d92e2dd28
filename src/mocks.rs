//! Test doubles.
//!
//! `MisbehavingToken` is a minimal fungible asset whose failure behavior is
//! switchable at runtime. The market's transfer normalization and its
//! reentrancy lock are exercised against it.

use odra::casper_types::U256;
use odra::prelude::*;
use odra::ContractRef;

use crate::market::MoneyMarketContractRef;

/// How the token behaves on its next transfer calls.
#[odra::odra_type]
#[derive(Default)]
pub enum TokenMode {
    /// Move funds and return true
    #[default]
    Honest = 0,
    /// Move nothing and return false
    ReturnFalse = 1,
    /// Move nothing and return true
    Lie = 2,
    /// Call back into the market mid-transfer, then behave honestly
    Reenter = 3,
}

#[odra::module]
pub struct MisbehavingToken {
    balances: Mapping<Address, U256>,
    allowances: Mapping<(Address, Address), U256>,
    mode: Var<TokenMode>,
    reenter_market: Var<Address>,
    reenter_record: Var<u64>,
}

#[odra::module]
impl MisbehavingToken {
    pub fn init(&mut self) {
        self.mode.set(TokenMode::Honest);
    }

    pub fn set_mode(&mut self, mode: TokenMode) {
        self.mode.set(mode);
    }

    /// Arm the reentrant callback: mid-transfer the token will try to
    /// withdraw from `record_id` on `market`.
    pub fn set_reentry(&mut self, market: Address, record_id: u64) {
        self.reenter_market.set(market);
        self.reenter_record.set(record_id);
    }

    pub fn mint(&mut self, to: Address, amount: U256) {
        let balance = self.balances.get(&to).unwrap_or_default();
        self.balances.set(&to, balance + amount);
    }

    pub fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).unwrap_or_default()
    }

    pub fn approve(&mut self, spender: Address, amount: U256) {
        let owner = self.env().caller();
        self.allowances.set(&(owner, spender), amount);
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).unwrap_or_default()
    }

    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        match self.mode.get_or_default() {
            TokenMode::Honest => self.raw_transfer(sender, recipient, amount),
            TokenMode::ReturnFalse => false,
            TokenMode::Lie => true,
            TokenMode::Reenter => {
                self.call_back_into_market();
                self.raw_transfer(sender, recipient, amount)
            }
        }
    }

    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
        match self.mode.get_or_default() {
            TokenMode::Honest => self.raw_transfer(owner, recipient, amount),
            TokenMode::ReturnFalse => false,
            TokenMode::Lie => true,
            TokenMode::Reenter => {
                self.call_back_into_market();
                self.raw_transfer(owner, recipient, amount)
            }
        }
    }

    fn call_back_into_market(&mut self) {
        if let Some(market) = self.reenter_market.get() {
            let record_id = self.reenter_record.get_or_default();
            let mut market = MoneyMarketContractRef::new(self.env().clone(), market);
            market.withdraw(record_id, U256::one());
        }
    }

    fn raw_transfer(&mut self, from: Address, to: Address, amount: U256) -> bool {
        let balance = self.balances.get(&from).unwrap_or_default();
        if balance < amount {
            return false;
        }
        self.balances.set(&from, balance - amount);
        let recipient_balance = self.balances.get(&to).unwrap_or_default();
        self.balances.set(&to, recipient_balance + amount);
        true
    }
}
