//! Installable logic module for the money market.
//!
//! The market never swaps its own code; it records the address of a
//! `LoanModule` and advances a version counter through an owner-gated
//! `initialize` handshake. The module declares its version, runs a one-shot
//! setup when (and only when) its registered market asks for it, and carries
//! the pool's aggregate borrow figure into the rate curve.
//!
//! The borrowing engine itself lives outside this core; `set_total_borrows`
//! is the surface it reports through.

use odra::casper_types::U256;
use odra::prelude::*;

#[odra::odra_error]
pub enum LoanError {
    DirectCallForbidden = 400,
    AlreadySetup = 401,
}

#[odra::module(errors = LoanError)]
pub struct LoanModule {
    market: Var<Address>,
    version: Var<u32>,
    total_borrows: Var<U256>,
    setup_done: Var<bool>,
}

#[odra::module]
impl LoanModule {
    /// Bind the module to the market it extends and declare its version.
    pub fn init(&mut self, market: Address, version: u32) {
        self.market.set(market);
        self.version.set(version);
        self.total_borrows.set(U256::zero());
        self.setup_done.set(false);
    }

    /// Version this module declares to the market's upgrade state machine.
    pub fn version(&self) -> u32 {
        self.version.get_or_default()
    }

    /// Market this module is bound to.
    pub fn market(&self) -> Option<Address> {
        self.market.get()
    }

    /// One-time setup, reachable only through the market's `initialize`.
    /// Calling the module's own address directly can never initialize it.
    pub fn initialize(&mut self) {
        let caller = self.env().caller();
        let market = match self.market.get() {
            Some(market) => market,
            None => self.env().revert(LoanError::DirectCallForbidden),
        };
        if !same_contract(&caller, &market) {
            self.env().revert(LoanError::DirectCallForbidden);
        }
        if self.setup_done.get_or_default() {
            self.env().revert(LoanError::AlreadySetup);
        }
        self.setup_done.set(true);
    }

    /// Aggregate outstanding borrows, as reported by the borrowing engine.
    pub fn total_borrows(&self) -> U256 {
        self.total_borrows.get_or_default()
    }

    /// Borrow-accounting report hook for the (external) borrowing engine.
    pub fn set_total_borrows(&mut self, amount: U256) {
        self.total_borrows.set(amount);
    }
}

/// Contract addresses can surface as entity or package wrappers depending on
/// how the call arrived; compare package hashes when plain equality misses.
fn same_contract(a: &Address, b: &Address) -> bool {
    if a == b {
        return true;
    }
    match (a.as_contract_package_hash(), b.as_contract_package_hash()) {
        (Some(a_pkg), Some(b_pkg)) => a_pkg == b_pkg,
        _ => false,
    }
}
