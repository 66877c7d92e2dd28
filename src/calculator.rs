//! Savings interest strategies.
//!
//! Three deployable calculators share one interface:
//! - `BaseInterestCalculator`: daily compounding only; the rate query is
//!   deliberately unimplemented (stand-in for "no strategy chosen").
//! - `SavingsInterestCalculatorV1`: linear-decay rate curve over pool size.
//! - `ZeroSavingsInterestCalculator`: flat zero rate.
//!
//! All arithmetic is integer fixed-point scaled by `MULTIPLIER` (1e18).

use odra::casper_types::U256;
use odra::prelude::*;

// ==========================================
// Constants
// ==========================================

/// Fixed-point scale, 18 decimals
pub const MULTIPLIER: u128 = 1_000_000_000_000_000_000;
/// Per-day rate at an empty pool (~8% APY compounded daily), wad-scaled
pub const INITIAL_RATE: u128 = 210_874_398_376_755;
/// Pool size at which the rate curve reaches zero
pub const MAX_SAVINGS: u128 = 2_000_000 * MULTIPLIER;
/// Compounding term length
pub const SECONDS_PER_DAY: u64 = 86_400;

// ==========================================
// Errors
// ==========================================

#[odra::odra_error]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CalculatorError {
    NotImplemented = 200,
    InvalidRate = 201,
    Overflow = 202,
}

// ==========================================
// Interface
// ==========================================

/// Interface the market consumes; implemented by every calculator contract.
#[odra::external_contract]
pub trait InterestCalculator {
    fn get_interest_rate(&self, total_savings: U256, total_borrows: U256, amount: U256) -> U256;
    fn get_expected_balance(&self, principal: U256, rate: U256, duration: u64) -> U256;
    fn multiplier(&self) -> U256;
}

// ==========================================
// Pure math
// ==========================================

/// Linear-decay rate curve: `INITIAL_RATE * (MAX_SAVINGS - effective) / MAX_SAVINGS`
/// where `effective = total_savings + amount`, clamped to zero at and beyond
/// capacity. Saturates instead of wrapping for arbitrarily large pools.
/// `total_borrows` is reserved and does not influence the curve.
pub fn decay_rate(total_savings: U256, _total_borrows: U256, amount: U256) -> U256 {
    let capacity = U256::from(MAX_SAVINGS);
    let effective = total_savings.saturating_add(amount);
    if effective >= capacity {
        return U256::zero();
    }
    // remaining < capacity, so the product stays far below U256::MAX
    U256::from(INITIAL_RATE) * (capacity - effective) / capacity
}

/// Compound `principal` at `rate` once per whole elapsed day.
///
/// A zero rate is an input error here: zero-interest pools install the zero
/// strategy instead of feeding 0 into the compounding path.
pub fn compound_daily(principal: U256, rate: U256, duration: u64) -> Result<U256, CalculatorError> {
    if principal.is_zero() {
        return Ok(U256::zero());
    }
    if duration == 0 {
        return Ok(principal);
    }
    if rate.is_zero() {
        return Err(CalculatorError::InvalidRate);
    }

    let scale = U256::from(MULTIPLIER);
    let growth = scale.checked_add(rate).ok_or(CalculatorError::Overflow)?;
    let days = duration / SECONDS_PER_DAY;

    let mut balance = principal;
    for _ in 0..days {
        balance = balance
            .checked_mul(growth)
            .ok_or(CalculatorError::Overflow)?
            / scale;
    }
    Ok(balance)
}

// ==========================================
// Contracts
// ==========================================

/// Abstract-base calculator: owns the shared compounding routine and refuses
/// to quote a rate. Useful as a "strategy not chosen" sentinel in tests.
#[odra::module(errors = CalculatorError)]
pub struct BaseInterestCalculator {}

#[odra::module]
impl BaseInterestCalculator {
    pub fn get_interest_rate(&self, total_savings: U256, total_borrows: U256, amount: U256) -> U256 {
        let _ = (total_savings, total_borrows, amount);
        self.env().revert(CalculatorError::NotImplemented)
    }

    /// Project `principal` forward through `duration` seconds of daily compounding.
    pub fn get_expected_balance(&self, principal: U256, rate: U256, duration: u64) -> U256 {
        match compound_daily(principal, rate, duration) {
            Ok(balance) => balance,
            Err(e) => self.env().revert(e),
        }
    }

    pub fn multiplier(&self) -> U256 {
        U256::from(MULTIPLIER)
    }
}

/// Production curve: rate decays linearly from `INITIAL_RATE` at an empty
/// pool to zero at `MAX_SAVINGS`.
#[odra::module(errors = CalculatorError)]
pub struct SavingsInterestCalculatorV1 {
    base: SubModule<BaseInterestCalculator>,
}

#[odra::module]
impl SavingsInterestCalculatorV1 {
    pub fn get_interest_rate(&self, total_savings: U256, total_borrows: U256, amount: U256) -> U256 {
        decay_rate(total_savings, total_borrows, amount)
    }

    pub fn get_expected_balance(&self, principal: U256, rate: U256, duration: u64) -> U256 {
        self.base.get_expected_balance(principal, rate, duration)
    }

    pub fn multiplier(&self) -> U256 {
        U256::from(MULTIPLIER)
    }
}

/// Flat-zero strategy for pools that pay no interest.
#[odra::module(errors = CalculatorError)]
pub struct ZeroSavingsInterestCalculator {
    base: SubModule<BaseInterestCalculator>,
}

#[odra::module]
impl ZeroSavingsInterestCalculator {
    pub fn get_interest_rate(&self, total_savings: U256, total_borrows: U256, amount: U256) -> U256 {
        let _ = (total_savings, total_borrows, amount);
        U256::zero()
    }

    pub fn get_expected_balance(&self, principal: U256, rate: U256, duration: u64) -> U256 {
        self.base.get_expected_balance(principal, rate, duration)
    }

    pub fn multiplier(&self) -> U256 {
        U256::from(MULTIPLIER)
    }
}

// ==========================================
// Tests
// ==========================================
