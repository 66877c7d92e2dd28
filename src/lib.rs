//! MoneyMarket x Casper — Pooled Savings Market (Odra)
//!
//! This crate implements a pooled money-market accounting core on Casper:
//! - MoneyMarket: savings ledger with lazy interest accrual, a versioned
//!   logic-module proxy, and a signature-gated invitation scheme
//! - Calculators: pluggable interest strategies (linear decay, flat zero)
//! - LoanModule: installable versioned extension + borrow accounting
//! - TestnetToken: faucet-mintable CEP-18 pool asset

#![cfg_attr(target_arch = "wasm32", no_std)]

extern crate alloc;

pub mod calculator;
pub mod invitation;
pub mod loan;
pub mod market;
pub mod mocks;
pub mod tokens;
