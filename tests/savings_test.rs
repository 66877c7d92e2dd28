//! Savings ledger tests
//!
//! Deposit/withdraw flows, raw-vs-computed balance projection, settlement
//! arithmetic, and normalization of asset-transfer failures.

use odra::casper_types::U256;
use odra::host::{Deployer, HostRef, NoArgs};
use odra::prelude::*;

use moneymarket_casper::calculator::{
    compound_daily, decay_rate, SavingsInterestCalculatorV1, ZeroSavingsInterestCalculator,
    MULTIPLIER, SECONDS_PER_DAY,
};
use moneymarket_casper::loan::{LoanModule, LoanModuleInitArgs};
use moneymarket_casper::market::{MoneyMarket, MoneyMarketHostRef, MoneyMarketInitArgs};
use moneymarket_casper::mocks::{MisbehavingToken, MisbehavingTokenHostRef, TokenMode};
use moneymarket_casper::tokens::{TestnetToken, TestnetTokenHostRef, TestnetTokenInitArgs};

const DAY_MS: u64 = 86_400 * 1_000;

fn wad(n: u64) -> U256 {
    U256::from(n) * U256::from(MULTIPLIER)
}

// ==========================================
// Helpers: deploy + funding
// ==========================================

fn deploy_pool(env: &odra::host::HostEnv) -> (TestnetTokenHostRef, MoneyMarketHostRef) {
    let owner = env.get_account(0);
    env.set_caller(owner);
    let token = TestnetToken::deploy(
        env,
        TestnetTokenInitArgs {
            name: "Testnet DAI".to_string(),
            symbol: "tDAI".to_string(),
            decimals: 18u8,
        },
    );
    let calculator = SavingsInterestCalculatorV1::deploy(env, NoArgs);
    let market = MoneyMarket::deploy(
        env,
        MoneyMarketInitArgs {
            asset: token.address(),
            savings_calculator: calculator.address(),
        },
    );
    (token, market)
}

fn fund(env: &odra::host::HostEnv, token: &TestnetTokenHostRef, market: &MoneyMarketHostRef, user: Address) {
    env.set_caller(user);
    let mut token_mut = TestnetTokenHostRef::new(token.address(), env.clone());
    token_mut.faucet_mint(user, wad(50_000_000));
    token_mut.approve(market.address(), U256::MAX);
}

// ==========================================
// Deposits
// ==========================================

#[test]
fn deposit_creates_records_with_snapshotted_rate() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);

    let amounts = [wad(100), wad(150), wad(200)];
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    env.set_caller(user);

    let mut total = U256::zero();
    for (i, amount) in amounts.iter().enumerate() {
        let expected_rate = decay_rate(total, U256::zero(), *amount);
        market_mut.deposit(*amount);

        let record = market_mut.get_raw_savings_record(i as u64);
        assert_eq!(record.id, i as u64);
        assert_eq!(record.owner, user);
        assert_eq!(record.balance, *amount);
        assert_eq!(record.principal, *amount);
        assert_eq!(record.interest_rate, expected_rate);

        // zero elapsed time: computed balance equals the deposit
        let projected = market_mut.get_savings_record(i as u64);
        assert_eq!(projected.balance, *amount);

        total += *amount;
    }

    assert_eq!(market_mut.total_funds(), total);
    assert_eq!(market_mut.get_savings_record_ids(user), vec![0u64, 1, 2]);
    assert_eq!(market_mut.savings_amount_of(user), total);

    // per-owner listing agrees with per-id lookups
    let records = market_mut.get_savings_records(user);
    assert_eq!(records.len(), 3);
    for (i, record) in records.iter().enumerate() {
        let each = market_mut.get_savings_record(i as u64);
        assert_eq!(record.id, each.id);
        assert_eq!(record.owner, each.owner);
        assert_eq!(record.interest_rate, each.interest_rate);
        assert_eq!(record.balance, each.balance);
        assert_eq!(record.principal, each.principal);
        assert_eq!(record.initial_timestamp, each.initial_timestamp);
    }
}

#[test]
#[should_panic(expected = "InvalidAmount")]
fn deposit_zero_reverts() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);

    env.set_caller(user);
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(U256::zero());
}

#[test]
#[should_panic(expected = "InsufficientFunds")]
fn deposit_without_funds_reverts() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let broke_user = env.get_account(1);

    // approved, but never minted
    env.set_caller(broke_user);
    let mut token_mut = TestnetTokenHostRef::new(token.address(), env.clone());
    token_mut.approve(market.address(), U256::MAX);

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));
}

#[test]
#[should_panic(expected = "AllowanceNotMet")]
fn deposit_without_approval_reverts() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);

    // minted, but never approved
    env.set_caller(user);
    let mut token_mut = TestnetTokenHostRef::new(token.address(), env.clone());
    token_mut.faucet_mint(user, wad(1_000));

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));
}

// ==========================================
// Raw vs computed projections
// ==========================================

#[test]
fn raw_balance_stays_put_while_computed_balance_accrues() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);

    env.set_caller(user);
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));
    let rate = market_mut.get_raw_savings_record(0).interest_rate;

    env.advance_block_time(10 * DAY_MS);

    let raw = market_mut.get_raw_savings_record(0);
    assert_eq!(raw.balance, wad(100));

    let expected = compound_daily(wad(100), rate, 10 * SECONDS_PER_DAY).unwrap();
    let projected = market_mut.get_savings_record(0);
    assert!(projected.balance > raw.balance);
    assert_eq!(projected.balance, expected);

    // reads are idempotent: no intervening write, identical results
    assert_eq!(market_mut.get_savings_record(0).balance, projected.balance);
    assert_eq!(market_mut.get_raw_savings_record(0).balance, raw.balance);
    assert_eq!(
        market_mut.get_raw_savings_record(0).initial_timestamp,
        raw.initial_timestamp
    );
}

#[test]
fn computed_balance_is_monotone_over_time() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);

    env.set_caller(user);
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));

    env.advance_block_time(10 * DAY_MS);
    let after_10 = market_mut.get_savings_record(0).balance;
    env.advance_block_time(20 * DAY_MS);
    let after_30 = market_mut.get_savings_record(0).balance;

    assert!(after_10 > wad(100));
    assert!(after_30 > after_10);
}

#[test]
fn zero_rate_records_never_accrue() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let owner = env.get_account(0);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);

    let zero_calculator = ZeroSavingsInterestCalculator::deploy(&env, NoArgs);
    env.set_caller(owner);
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.set_savings_calculator(zero_calculator.address());

    env.set_caller(user);
    market_mut.deposit(wad(100));
    assert_eq!(market_mut.get_raw_savings_record(0).interest_rate, U256::zero());

    env.advance_block_time(365 * DAY_MS);
    assert_eq!(market_mut.get_savings_record(0).balance, wad(100));
}

#[test]
#[should_panic(expected = "InvalidRecordId")]
fn unknown_record_id_reverts() {
    let env = odra_test::env();
    let (_token, market) = deploy_pool(&env);
    let market_ref = MoneyMarketHostRef::new(market.address(), env.clone());
    market_ref.get_savings_record(25);
}

#[test]
#[should_panic(expected = "InvalidRecordId")]
fn unknown_raw_record_id_reverts() {
    let env = odra_test::env();
    let (_token, market) = deploy_pool(&env);
    let market_ref = MoneyMarketHostRef::new(market.address(), env.clone());
    market_ref.get_raw_savings_record(25);
}

// ==========================================
// Withdrawals
// ==========================================

#[test]
fn withdraw_settles_interest_into_stored_balance() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);

    env.set_caller(user);
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));

    env.advance_block_time(10 * DAY_MS);
    let current = market_mut.get_savings_record(0).balance;
    let accrued = current - wad(100);

    // top custody up so accrued interest is actually payable
    let mut token_mut = TestnetTokenHostRef::new(token.address(), env.clone());
    token_mut.faucet_mint(market.address(), accrued);

    env.set_caller(user);
    let balance_before = token_mut.balance_of(user);
    market_mut.withdraw(0, wad(50));

    let raw = market_mut.get_raw_savings_record(0);
    assert_eq!(raw.balance, current - wad(50));
    // settlement restarts the clock: zero further elapsed time, same value
    assert_eq!(market_mut.get_savings_record(0).balance, current - wad(50));
    assert_eq!(token_mut.balance_of(user), balance_before + wad(50));
    assert_eq!(market_mut.total_funds(), wad(100) + accrued - wad(50));
}

#[test]
fn withdraw_full_balance_leaves_empty_record() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);

    env.set_caller(user);
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));

    env.advance_block_time(30 * DAY_MS);
    let current = market_mut.get_savings_record(0).balance;

    let mut token_mut = TestnetTokenHostRef::new(token.address(), env.clone());
    token_mut.faucet_mint(market.address(), current - wad(100));

    env.set_caller(user);
    market_mut.withdraw(0, current);

    // the record survives at zero; it is never deleted
    let raw = market_mut.get_raw_savings_record(0);
    assert_eq!(raw.balance, U256::zero());
    assert_eq!(raw.principal, wad(100));
    assert_eq!(market_mut.get_savings_record(0).balance, U256::zero());
    assert_eq!(market_mut.get_savings_record_ids(user), vec![0u64]);
}

#[test]
#[should_panic(expected = "InvalidRecordId")]
fn withdraw_unknown_record_reverts() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);

    env.set_caller(user);
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));
    market_mut.withdraw(5, wad(50));
}

#[test]
#[should_panic(expected = "InvalidOwner")]
fn withdraw_someone_elses_record_reverts() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);
    let other = env.get_account(2);
    fund(&env, &token, &market, user);

    env.set_caller(user);
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));

    env.set_caller(other);
    market_mut.withdraw(0, wad(50));
}

#[test]
#[should_panic(expected = "InsufficientBalance")]
fn withdraw_more_than_computed_balance_reverts() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);

    env.set_caller(user);
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));

    env.advance_block_time(10 * DAY_MS);
    let current = market_mut.get_savings_record(0).balance;
    market_mut.withdraw(0, current + U256::one());
}

#[test]
#[should_panic(expected = "InsufficientFund")]
fn withdraw_reverts_when_pool_runs_dry() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let users = [env.get_account(1), env.get_account(2), env.get_account(3)];
    let amounts = [wad(100), wad(150), wad(200)];
    for user in users {
        fund(&env, &token, &market, user);
    }

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    for (user, amount) in users.iter().zip(amounts.iter()) {
        env.set_caller(*user);
        market_mut.deposit(*amount);
    }

    env.advance_block_time(10 * DAY_MS);

    // the first two drain principal + interest out of shared custody; the
    // third finds the pool short
    for (i, user) in users.iter().enumerate() {
        env.set_caller(*user);
        let current = market_mut.get_savings_record(i as u64).balance;
        market_mut.withdraw(i as u64, current);
    }
}

// ==========================================
// Transfer failure normalization
// ==========================================

fn deploy_hostile_pool(env: &odra::host::HostEnv) -> (MisbehavingTokenHostRef, MoneyMarketHostRef) {
    let owner = env.get_account(0);
    env.set_caller(owner);
    let token = MisbehavingToken::deploy(env, NoArgs);
    let calculator = SavingsInterestCalculatorV1::deploy(env, NoArgs);
    let market = MoneyMarket::deploy(
        env,
        MoneyMarketInitArgs {
            asset: token.address(),
            savings_calculator: calculator.address(),
        },
    );
    (token, market)
}

#[test]
#[should_panic(expected = "TransferFailed")]
fn deposit_surfaces_false_returning_token() {
    let env = odra_test::env();
    let (token, market) = deploy_hostile_pool(&env);
    let user = env.get_account(1);

    let mut token_mut = MisbehavingTokenHostRef::new(token.address(), env.clone());
    env.set_caller(user);
    token_mut.mint(user, wad(1_000));
    token_mut.approve(market.address(), U256::MAX);
    token_mut.set_mode(TokenMode::ReturnFalse);

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));
}

#[test]
#[should_panic(expected = "TokenReverted")]
fn deposit_surfaces_token_that_claims_success_without_moving_funds() {
    let env = odra_test::env();
    let (token, market) = deploy_hostile_pool(&env);
    let user = env.get_account(1);

    let mut token_mut = MisbehavingTokenHostRef::new(token.address(), env.clone());
    env.set_caller(user);
    token_mut.mint(user, wad(1_000));
    token_mut.approve(market.address(), U256::MAX);
    token_mut.set_mode(TokenMode::Lie);

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));
}

#[test]
#[should_panic(expected = "TransferFailed")]
fn withdraw_surfaces_false_returning_token() {
    let env = odra_test::env();
    let (token, market) = deploy_hostile_pool(&env);
    let user = env.get_account(1);

    let mut token_mut = MisbehavingTokenHostRef::new(token.address(), env.clone());
    env.set_caller(user);
    token_mut.mint(user, wad(1_000));
    token_mut.approve(market.address(), U256::MAX);

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));

    token_mut.set_mode(TokenMode::ReturnFalse);
    market_mut.withdraw(0, wad(50));
}

#[test]
#[should_panic(expected = "TokenReverted")]
fn withdraw_surfaces_lying_token() {
    let env = odra_test::env();
    let (token, market) = deploy_hostile_pool(&env);
    let user = env.get_account(1);

    let mut token_mut = MisbehavingTokenHostRef::new(token.address(), env.clone());
    env.set_caller(user);
    token_mut.mint(user, wad(1_000));
    token_mut.approve(market.address(), U256::MAX);

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));

    token_mut.set_mode(TokenMode::Lie);
    market_mut.withdraw(0, wad(50));
}

#[test]
#[should_panic(expected = "Reentrant")]
fn withdraw_rejects_reentrant_callback() {
    let env = odra_test::env();
    let (token, market) = deploy_hostile_pool(&env);
    let user = env.get_account(1);

    let mut token_mut = MisbehavingTokenHostRef::new(token.address(), env.clone());
    env.set_caller(user);
    token_mut.mint(user, wad(1_000));
    token_mut.approve(market.address(), U256::MAX);

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.deposit(wad(100));

    // mid-payout the token loops back into withdraw; the lock trips
    token_mut.set_reentry(market.address(), 0);
    token_mut.set_mode(TokenMode::Reenter);
    market_mut.withdraw(0, wad(50));
}

// ==========================================
// Minimum deposit floor
// ==========================================

fn install_module(env: &odra::host::HostEnv, market: &MoneyMarketHostRef) {
    let owner = env.get_account(0);
    env.set_caller(owner);
    let module = LoanModule::deploy(
        env,
        LoanModuleInitArgs {
            market: market.address(),
            version: 1u32,
        },
    );
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.set_loan(module.address());
    market_mut.initialize();
}

#[test]
fn minimum_amount_gates_deposits_once_configured() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let owner = env.get_account(0);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);
    install_module(&env, &market);

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    env.set_caller(owner);
    market_mut.set_minimum_savings_amount(wad(100));
    assert_eq!(market_mut.minimum_savings_amount(), wad(100));

    env.set_caller(user);
    // at the floor is fine
    market_mut.deposit(wad(100));
    assert_eq!(market_mut.get_raw_savings_record(0).balance, wad(100));
}

#[test]
#[should_panic(expected = "BelowMinimumSavings")]
fn deposit_below_minimum_reverts() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let owner = env.get_account(0);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);
    install_module(&env, &market);

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    env.set_caller(owner);
    market_mut.set_minimum_savings_amount(wad(100));

    env.set_caller(user);
    market_mut.deposit(wad(99));
}

#[test]
#[should_panic(expected = "NotOwner")]
fn set_minimum_amount_requires_owner() {
    let env = odra_test::env();
    let (_token, market) = deploy_pool(&env);
    install_module(&env, &market);

    env.set_caller(env.get_account(1));
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.set_minimum_savings_amount(wad(100));
}

// ==========================================
// Rate and APR views
// ==========================================

#[test]
fn rate_views_track_pool_state() {
    let env = odra_test::env();
    let (token, market) = deploy_pool(&env);
    let user = env.get_account(1);
    fund(&env, &token, &market, user);

    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    assert_eq!(
        market_mut.current_savings_rate(),
        decay_rate(U256::zero(), U256::zero(), U256::zero())
    );
    assert_eq!(
        market_mut.expected_savings_rate(wad(1_000)),
        decay_rate(U256::zero(), U256::zero(), wad(1_000))
    );

    env.set_caller(user);
    market_mut.deposit(wad(1_000));
    assert_eq!(
        market_mut.current_savings_rate(),
        decay_rate(wad(1_000), U256::zero(), U256::zero())
    );
}

#[test]
fn apr_views_project_one_year_of_compounding() {
    let env = odra_test::env();
    let (_token, market) = deploy_pool(&env);
    let market_ref = MoneyMarketHostRef::new(market.address(), env.clone());

    let rate = decay_rate(U256::zero(), U256::zero(), U256::zero());
    let expected =
        compound_daily(U256::from(MULTIPLIER), rate, 365 * SECONDS_PER_DAY).unwrap()
            - U256::from(MULTIPLIER);
    assert_eq!(market_ref.current_savings_apr(), expected);
    assert!(market_ref.current_savings_apr() > U256::zero());
}

#[test]
fn apr_is_zero_under_the_zero_strategy() {
    let env = odra_test::env();
    let (_token, market) = deploy_pool(&env);
    let owner = env.get_account(0);

    let zero_calculator = ZeroSavingsInterestCalculator::deploy(&env, NoArgs);
    env.set_caller(owner);
    let mut market_mut = MoneyMarketHostRef::new(market.address(), env.clone());
    market_mut.set_savings_calculator(zero_calculator.address());

    assert_eq!(market_mut.current_savings_apr(), U256::zero());
    assert_eq!(market_mut.current_savings_rate(), U256::zero());
}
