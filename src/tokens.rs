//! Pool asset plumbing.
//!
//! The market consumes its asset through the `FungibleAsset` interface:
//! CEP-18-style accounting where `transfer`/`transfer_from` report failure
//! by returning `false` (a token may also abort outright; the market
//! normalizes both, see `market::MoneyMarket`).
//!
//! `TestnetToken` is the crate's own asset implementation — a CEP-18 token
//! with an open faucet, used by the test suites and the livenet demo.

use alloc::string::String;
use odra::casper_types::U256;
use odra::prelude::*;
use odra_modules::cep18::events::{Mint, SetAllowance, Transfer, TransferFrom};
use odra_modules::cep18::storage::{
    Cep18AllowancesStorage, Cep18BalancesStorage, Cep18DecimalsStorage, Cep18NameStorage,
    Cep18SymbolStorage, Cep18TotalSupplyStorage,
};

// ==========================================
// Asset interface
// ==========================================

/// The transfer capability the market depends on.
#[odra::external_contract]
pub trait FungibleAsset {
    fn balance_of(&self, owner: Address) -> U256;
    fn allowance(&self, owner: Address, spender: Address) -> U256;
    fn transfer(&mut self, recipient: Address, amount: U256) -> bool;
    fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool;
}

// ==========================================
// Errors
// ==========================================

/// Errors for token operations (aligned with CEP-18 codes where applicable)
#[odra::odra_error]
pub enum TokenError {
    InsufficientBalance = 60001,
    InsufficientAllowance = 60002,
    CannotTargetSelfUser = 60003,
}

// ==========================================
// Testnet token
// ==========================================

/// Faucet-mintable CEP-18 token; anyone can mint themselves test funds.
#[odra::module(
    events = [
        Mint,
        SetAllowance,
        Transfer,
        TransferFrom
    ],
    errors = TokenError
)]
pub struct TestnetToken {
    name: SubModule<Cep18NameStorage>,
    symbol: SubModule<Cep18SymbolStorage>,
    decimals: SubModule<Cep18DecimalsStorage>,
    total_supply: SubModule<Cep18TotalSupplyStorage>,
    balances: SubModule<Cep18BalancesStorage>,
    allowances: SubModule<Cep18AllowancesStorage>,
}

#[odra::module]
impl TestnetToken {
    /// Initialize the token
    pub fn init(&mut self, name: String, symbol: String, decimals: u8) {
        self.name.set(name);
        self.symbol.set(symbol);
        self.decimals.set(decimals);
        self.total_supply.set(U256::zero());
        self.allowances.init();
        self.balances.init();
    }

    /// Token name
    pub fn name(&self) -> String {
        self.name.get()
    }

    /// Token symbol
    pub fn symbol(&self) -> String {
        self.symbol.get()
    }

    /// Token decimals
    pub fn decimals(&self) -> u8 {
        self.decimals.get()
    }

    /// Total supply
    pub fn total_supply(&self) -> U256 {
        self.total_supply.get()
    }

    /// Balance of an address
    pub fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).unwrap_or_default()
    }

    /// Allowance from owner to spender
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get_or_default(&owner, &spender)
    }

    /// Approve spender
    pub fn approve(&mut self, spender: Address, amount: U256) {
        let owner = self.env().caller();
        if owner == spender {
            self.env().revert(TokenError::CannotTargetSelfUser);
        }
        self.allowances.set(&owner, &spender, amount);
        self.env().emit_event(SetAllowance {
            owner,
            spender,
            allowance: amount,
        });
    }

    /// Transfer tokens; reports success by return value
    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        if sender == recipient {
            self.env().revert(TokenError::CannotTargetSelfUser);
        }
        self.raw_transfer(&sender, &recipient, &amount);
        self.env().emit_event(Transfer {
            sender,
            recipient,
            amount,
        });
        true
    }

    /// Transfer from (with allowance); reports success by return value
    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
        if owner == recipient {
            self.env().revert(TokenError::CannotTargetSelfUser);
        }
        if amount.is_zero() {
            return true;
        }
        let spender = self.env().caller();
        let allowance = self.allowances.get_or_default(&owner, &spender);
        if allowance < amount {
            self.env().revert(TokenError::InsufficientAllowance);
        }
        self.allowances.set(&owner, &spender, allowance - amount);
        self.raw_transfer(&owner, &recipient, &amount);
        self.env().emit_event(TransferFrom {
            spender,
            owner,
            recipient,
            amount,
        });
        true
    }

    /// Faucet mint - anyone can call to get test tokens
    pub fn faucet_mint(&mut self, to: Address, amount: U256) {
        self.total_supply.add(amount);
        self.balances.add(&to, amount);
        self.env().emit_event(Mint {
            recipient: to,
            amount,
        });
    }

    // Internal transfer
    fn raw_transfer(&mut self, sender: &Address, recipient: &Address, amount: &U256) {
        let balance = self.balances.get(sender).unwrap_or_default();
        if balance < *amount {
            self.env().revert(TokenError::InsufficientBalance);
        }
        if !amount.is_zero() {
            self.balances.subtract(sender, *amount);
            self.balances.add(recipient, *amount);
        }
    }
}
