//! Livenet deploy and demo binary for the MoneyMarket savings pool.
//!
//! Run with:
//! - Deploy only:       MARKET_LIVENET_MODE=deploy cargo run --bin market_livenet --features=livenet
//! - Deploy + demo:     MARKET_LIVENET_MODE=deploy_and_demo cargo run --bin market_livenet --features=livenet
//! - Demo on existing:  MARKET_LIVENET_MODE=demo MARKET_EXISTING_MARKET=... MARKET_EXISTING_TOKEN=... cargo run ...
//!
//! Required environment variables (Odra livenet):
//! - ODRA_CASPER_LIVENET_SECRET_KEY_PATH
//! - ODRA_CASPER_LIVENET_NODE_ADDRESS        (base URL; Odra appends "/rpc")
//! - ODRA_CASPER_LIVENET_EVENTS_URL          (required by Odra; placeholder URL is OK here)
//! - ODRA_CASPER_LIVENET_CHAIN_NAME
//!
//! Optional:
//! - ODRA_CASPER_LIVENET_DEPLOY_GAS          (motes)
//! - ODRA_CASPER_LIVENET_CALL_GAS            (motes)
//! - MARKET_EXISTING_TOKEN                   (64-hex or "hash-..."/"contract-package-...")
//! - MARKET_EXISTING_MARKET                  (same formats)
//! - MARKET_DEMO_DEPOSIT                     (whole tokens, default: 100)

use odra::casper_types::U256;
use odra::host::{Deployer, HostRef, HostRefLoader};
use odra::prelude::*;

use moneymarket_casper::calculator::{SavingsInterestCalculatorV1, MULTIPLIER};
use moneymarket_casper::loan::{LoanModule, LoanModuleInitArgs};
use moneymarket_casper::market::{MoneyMarket, MoneyMarketInitArgs};
use moneymarket_casper::tokens::{TestnetToken, TestnetTokenInitArgs};

const DEFAULT_DEPLOY_GAS_MOTES: u64 = 600_000_000_000; // 600 CSPR
const DEFAULT_CALL_GAS_MOTES: u64 = 50_000_000_000; // 50 CSPR

fn wad(n: u64) -> U256 {
    U256::from(n) * U256::from(MULTIPLIER)
}

fn main() {
    println!("============================================");
    println!("  MoneyMarket Savings Pool — Livenet");
    println!("============================================\n");

    let env = odra_casper_livenet_env::env();

    let mode = std::env::var("MARKET_LIVENET_MODE").unwrap_or_else(|_| "deploy".to_string());
    let should_deploy = mode == "deploy" || mode == "deploy_and_demo";
    let should_demo = mode == "demo" || mode == "deploy_and_demo";

    let deploy_gas = read_u64_env("ODRA_CASPER_LIVENET_DEPLOY_GAS", DEFAULT_DEPLOY_GAS_MOTES);
    let call_gas = read_u64_env("ODRA_CASPER_LIVENET_CALL_GAS", DEFAULT_CALL_GAS_MOTES);
    let deposit_tokens = read_u64_env("MARKET_DEMO_DEPOSIT", 100);

    println!("[INFO] Mode: {}", mode);
    println!("[INFO] Caller: {:?}", env.caller());
    println!("[INFO] Gas (motes): deploy={}, calls={}", deploy_gas, call_gas);
    println!();

    // ==========================================
    // Step 1: Deploy (or reuse) the pool asset
    // ==========================================
    let mut token = if should_deploy {
        println!("[STEP 1] Deploying testnet token...");
        env.set_gas(deploy_gas);
        let token = TestnetToken::deploy(
            &env,
            TestnetTokenInitArgs {
                name: "Testnet DAI".to_string(),
                symbol: "tDAI".to_string(),
                decimals: 18u8,
            },
        );
        println!("[OK] Token deployed at: {:?}", token.address());
        token
    } else {
        println!("[STEP 1] Reusing existing token...");
        let raw = std::env::var("MARKET_EXISTING_TOKEN")
            .unwrap_or_else(|_| panic!("MARKET_EXISTING_TOKEN must be set for mode={}", mode));
        TestnetToken::load(&env, parse_contract_address(&raw))
    };
    let token_addr = token.address();
    println!();

    // ==========================================
    // Step 2: Deploy (or reuse) the market with its rate strategy
    // ==========================================
    let mut market = if should_deploy {
        println!("[STEP 2] Deploying interest calculator + market...");
        env.set_gas(deploy_gas);
        let calculator = SavingsInterestCalculatorV1::deploy(&env, odra::host::NoArgs);
        println!("[OK] Calculator deployed at: {:?}", calculator.address());

        env.set_gas(deploy_gas);
        let market = MoneyMarket::deploy(
            &env,
            MoneyMarketInitArgs {
                asset: token_addr,
                savings_calculator: calculator.address(),
            },
        );
        println!("[OK] Market deployed at: {:?}", market.address());

        // Install and initialize the v1 extension module
        env.set_gas(deploy_gas);
        let module = LoanModule::deploy(
            &env,
            LoanModuleInitArgs {
                market: market.address(),
                version: 1u32,
            },
        );
        println!("[OK] Loan module (v1) deployed at: {:?}", module.address());

        let mut market = market;
        env.set_gas(call_gas);
        market.set_loan(module.address());
        env.set_gas(call_gas);
        market.initialize();
        println!("[OK] Market initialized to version {}", market.version());

        env.set_gas(call_gas);
        market.set_amount_of_savings_per_invite(wad(25));
        market
    } else {
        println!("[STEP 2] Reusing existing market...");
        let raw = std::env::var("MARKET_EXISTING_MARKET")
            .unwrap_or_else(|_| panic!("MARKET_EXISTING_MARKET must be set for mode={}", mode));
        MoneyMarket::load(&env, parse_contract_address(&raw))
    };
    let market_addr = market.address();
    println!();

    // ==========================================
    // Demo: faucet-mint, approve, deposit, inspect
    // ==========================================
    if should_demo {
        let caller = env.caller();
        let amount = wad(deposit_tokens);

        println!("[DEMO 1] Minting {} tokens from the faucet...", deposit_tokens);
        env.set_gas(call_gas);
        token.faucet_mint(caller, amount);

        println!("[DEMO 2] Approving the market...");
        env.set_gas(call_gas);
        token.approve(market_addr, amount);

        println!("[DEMO 3] Depositing {} tokens...", deposit_tokens);
        env.set_gas(call_gas);
        market.deposit(amount);

        let ids = market.get_savings_record_ids(caller);
        if let Some(id) = ids.last() {
            let record = market.get_savings_record(*id);
            println!("[OK] Record #{} balance={} rate={}", id, record.balance, record.interest_rate);
        }
        println!("[INFO] Pool totals: funds={}", market.total_funds());
        println!("[INFO] Current APR (wad): {}", market.current_savings_apr());
        println!();
    }

    output_deploy_json(token_addr, market_addr);
}

fn read_u64_env(key: &str, default_value: u64) -> u64 {
    match std::env::var(key) {
        Ok(value) => value.trim().parse::<u64>().unwrap_or(default_value),
        Err(_) => default_value,
    }
}

fn output_deploy_json(token_addr: Address, market_addr: Address) {
    let chain_name = std::env::var("ODRA_CASPER_LIVENET_CHAIN_NAME")
        .unwrap_or_else(|_| "casper-test".to_string());
    let node_url = std::env::var("ODRA_CASPER_LIVENET_NODE_ADDRESS")
        .unwrap_or_else(|_| "https://node.testnet.casper.network".to_string());

    println!(
        r#"MARKET_DEPLOY_JSON={{"chain_name":"{}","node_url":"{}","token_contract":"{:?}","market_contract":"{:?}","deployed_at":"{}"}}"#,
        chain_name,
        node_url,
        token_addr,
        market_addr,
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
    );
}

fn parse_contract_address(raw: &str) -> Address {
    use odra::casper_types::account::AccountHash;
    use odra::casper_types::contracts::ContractPackageHash;

    fn decode_hex_32(s: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            panic!("Invalid address hash (expected 64 hex): {}", s);
        }
        for i in 0..32 {
            let byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .unwrap_or_else(|_| panic!("Invalid hex in address: {}", s));
            out[i] = byte;
        }
        out
    }

    let trimmed = raw.trim();
    if let Some(hex) = trimmed.strip_prefix("account-hash-") {
        return Address::Account(AccountHash::new(decode_hex_32(hex)));
    }
    if let Some(hex) = trimmed.strip_prefix("contract-package-") {
        return Address::Contract(ContractPackageHash::new(decode_hex_32(hex)));
    }
    if let Some(hex) = trimmed.strip_prefix("package-") {
        return Address::Contract(ContractPackageHash::new(decode_hex_32(hex)));
    }
    if let Some(hex) = trimmed.strip_prefix("hash-") {
        return Address::Contract(ContractPackageHash::new(decode_hex_32(hex)));
    }
    if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Address::Contract(ContractPackageHash::new(decode_hex_32(trimmed)));
    }

    panic!("Invalid address format: {}", trimmed);
}
