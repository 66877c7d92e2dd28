//! MoneyMarket — pooled interest-bearing savings.
//!
//! One contract owns all storage: the savings ledger (per-deposit records
//! with a snapshotted rate and lazy accrual), the versioned-module proxy
//! state, and the invitation gate. Interest strategies and the loan module
//! are separate contracts reached by address, so the pool's behavior can be
//! extended without touching stored records.
//!
//! ## Balances
//! A record's stored balance only changes on settlement (withdrawal). Reads
//! come in two flavors: raw (stored state as-is) and computed (stored
//! balance projected through the interest strategy for elapsed time).
//!
//! ## Units
//! Amounts are 18-decimal fixed point (U256); timestamps are milliseconds;
//! strategy durations are seconds.

use alloc::vec::Vec;
use odra::casper_types::account::AccountHash;
use odra::casper_types::bytesrepr::Bytes;
use odra::casper_types::U256;
use odra::prelude::*;
use odra::ContractRef;

use crate::calculator::{InterestCalculatorContractRef, MULTIPLIER, SECONDS_PER_DAY};
use crate::invitation::{InvitationError, InvitationGate, CODE_LENGTH, DATA_TAG_CODE};
use crate::invitation::events as invitation_events;
use crate::loan::LoanModuleContractRef;
use crate::tokens::FungibleAssetContractRef;

/// Casper block time is milliseconds; strategies take seconds.
const MILLIS_PER_SECOND: u64 = 1_000;
/// Projection horizon for the APR views
const DAYS_PER_YEAR: u64 = 365;

// ==========================================
// Events
// ==========================================

pub mod events {
    use odra::casper_types::U256;
    use odra::prelude::*;

    #[odra::event]
    pub struct SavingsDeposited {
        pub record_id: u64,
        pub owner: Address,
        pub balance: U256,
        pub rate: U256,
    }

    #[odra::event]
    pub struct SavingsWithdrawn {
        pub record_id: u64,
        pub owner: Address,
        pub amount: U256,
        pub remaining_balance: U256,
    }

    #[odra::event]
    pub struct LoanChanged {
        pub previous: Option<Address>,
        pub current: Address,
    }

    #[odra::event]
    pub struct SavingsCalculatorChanged {
        pub previous: Option<Address>,
        pub current: Address,
    }

    #[odra::event]
    pub struct OwnershipTransferred {
        pub previous_owner: Option<Address>,
        pub new_owner: Address,
    }

    #[odra::event]
    pub struct Initialized {
        pub version: u32,
    }

    #[odra::event]
    pub struct MinimumSavingsAmountChanged {
        pub from: U256,
        pub to: U256,
    }
}

// ==========================================
// Types
// ==========================================

/// One deposit's accounting entry. `balance` is the settled (raw) balance;
/// `principal` is the original deposit amount and never changes.
#[odra::odra_type]
pub struct SavingsRecord {
    pub id: u64,
    pub owner: Address,
    pub interest_rate: U256,
    pub balance: U256,
    pub principal: U256,
    pub initial_timestamp: u64,
}

// ==========================================
// Errors
// ==========================================

#[odra::odra_error]
pub enum MarketError {
    InvalidAmount = 1,
    ZeroAddress = 2,
    InvalidRecordId = 3,
    InvalidOwner = 4,
    InsufficientBalance = 5,
    InsufficientFund = 6,
    InsufficientFunds = 7,
    AllowanceNotMet = 8,
    TransferFailed = 9,
    TokenReverted = 10,
    NotOwner = 11,
    Reentrant = 12,
    CannotDispatch = 13,
    VersionTooLow = 14,
    VersionNotContinuous = 15,
    AlreadyInitialized = 16,
    NotInitialized = 17,
    BelowMinimumSavings = 18,
    NotRedeemedUser = 19,
}

// ==========================================
// Contract
// ==========================================

#[odra::module(events = [
    events::SavingsDeposited,
    events::SavingsWithdrawn,
    events::LoanChanged,
    events::SavingsCalculatorChanged,
    events::OwnershipTransferred,
    events::Initialized,
    events::MinimumSavingsAmountChanged,
    invitation_events::InvitationCodeUsed,
    invitation_events::AmountOfSavingsPerInviteChanged
], errors = MarketError)]
pub struct MoneyMarket {
    // Collaborators
    asset: Var<Address>,
    savings_calculator: Var<Address>,

    // Module proxy state
    loan: Var<Address>,
    version: Var<u32>,

    // Ledger
    total_funds: Var<U256>,
    next_record_id: Var<u64>,
    records: Mapping<u64, SavingsRecord>,
    record_ids: Mapping<Address, Vec<u64>>,
    minimum_savings_amount: Var<U256>,

    // Invitation gate
    invitations: SubModule<InvitationGate>,

    // Admin
    owner: Var<Address>,
    lock: Var<bool>,
}

#[odra::module]
impl MoneyMarket {
    // ==========================================
    // Initialization
    // ==========================================

    /// Initialize the market with its pool asset and interest strategy
    pub fn init(&mut self, asset: Address, savings_calculator: Address) {
        self.asset.set(asset);
        self.savings_calculator.set(savings_calculator);
        self.version.set(0);
        self.total_funds.set(U256::zero());
        self.next_record_id.set(0);
        self.minimum_savings_amount.set(U256::zero());
        self.owner.set(self.env().caller());
        self.lock.set(false);
    }

    // ==========================================
    // Savings
    // ==========================================

    /// Deposit `amount` of the pool asset into a new savings record.
    /// The record snapshots the current interest rate for its lifetime.
    pub fn deposit(&mut self, amount: U256) {
        self.enter_guard();
        let caller = self.env().caller();
        self.deposit_into_record(caller, amount);
        self.exit_guard();
    }

    /// Withdraw `amount` from record `record_id`, settling accrued interest
    /// into the stored balance first.
    pub fn withdraw(&mut self, record_id: u64, amount: U256) {
        self.enter_guard();
        let caller = self.env().caller();
        let mut record = self.require_record(record_id);
        if record.owner != caller {
            self.env().revert(MarketError::InvalidOwner);
        }

        let current = self.computed_balance(&record);
        if amount > current {
            self.env().revert(MarketError::InsufficientBalance);
        }

        // Pool availability is judged with this record's accrued interest
        // already materialized, bounded by what custody actually holds.
        let accrued = current - record.balance;
        let funds = self.total_funds.get_or_default() + accrued;
        let ledger_available = funds.saturating_sub(self.total_borrows());
        let custody = self.asset_ref().balance_of(self.env().self_address());
        if amount > ledger_available.min(custody) {
            self.env().revert(MarketError::InsufficientFund);
        }

        // Settlement: fold accrued interest in, take the withdrawal out,
        // restart the accrual clock.
        record.balance = current - amount;
        record.initial_timestamp = self.env().get_block_time();
        self.records.set(&record_id, record.clone());
        self.total_funds.set(funds - amount);

        self.release_asset(caller, amount);

        self.env().emit_event(events::SavingsWithdrawn {
            record_id,
            owner: caller,
            amount,
            remaining_balance: record.balance,
        });
        self.exit_guard();
    }

    // ==========================================
    // Record views
    // ==========================================

    /// Stored record state, exactly as last settled
    pub fn get_raw_savings_record(&self, record_id: u64) -> SavingsRecord {
        self.require_record(record_id)
    }

    /// Stored record state for every record `owner` holds
    pub fn get_raw_savings_records(&self, owner: Address) -> Vec<SavingsRecord> {
        self.record_ids
            .get(&owner)
            .unwrap_or_default()
            .iter()
            .map(|id| self.require_record(*id))
            .collect()
    }

    /// Record with its balance projected through the interest strategy for
    /// elapsed time. Pure read; repeated calls agree until the next write.
    pub fn get_savings_record(&self, record_id: u64) -> SavingsRecord {
        let mut record = self.require_record(record_id);
        record.balance = self.computed_balance(&record);
        record
    }

    /// Projected records for every record `owner` holds
    pub fn get_savings_records(&self, owner: Address) -> Vec<SavingsRecord> {
        self.record_ids
            .get(&owner)
            .unwrap_or_default()
            .iter()
            .map(|id| self.get_savings_record(*id))
            .collect()
    }

    /// Record ids owned by `owner`, ordered by creation
    pub fn get_savings_record_ids(&self, owner: Address) -> Vec<u64> {
        self.record_ids.get(&owner).unwrap_or_default()
    }

    /// Sum of `owner`'s stored balances (settled principal, no projection)
    pub fn savings_amount_of(&self, owner: Address) -> U256 {
        self.record_ids
            .get(&owner)
            .unwrap_or_default()
            .iter()
            .fold(U256::zero(), |sum, id| {
                sum + self.require_record(*id).balance
            })
    }

    // ==========================================
    // Pool views
    // ==========================================

    /// Outstanding principal plus settled interest across all records
    pub fn total_funds(&self) -> U256 {
        self.total_funds.get_or_default()
    }

    /// Aggregate borrows reported by the loan module; zero with none installed
    pub fn total_borrows(&self) -> U256 {
        match self.loan.get() {
            Some(module) => LoanModuleContractRef::new(self.env().clone(), module).total_borrows(),
            None => U256::zero(),
        }
    }

    /// Rate a deposit made right now would snapshot
    pub fn current_savings_rate(&self) -> U256 {
        self.expected_savings_rate(U256::zero())
    }

    /// Rate a deposit of `amount` would snapshot
    pub fn expected_savings_rate(&self, amount: U256) -> U256 {
        self.calculator_ref().get_interest_rate(
            self.total_funds.get_or_default(),
            self.total_borrows(),
            amount,
        )
    }

    /// Yearly growth of one unit at the current rate, wad-scaled
    pub fn current_savings_apr(&self) -> U256 {
        self.annualize(self.current_savings_rate())
    }

    /// Yearly growth of one unit at the rate a deposit of `amount` would get
    pub fn expected_savings_apr(&self, amount: U256) -> U256 {
        self.annualize(self.expected_savings_rate(amount))
    }

    pub fn asset(&self) -> Option<Address> {
        self.asset.get()
    }

    pub fn savings_calculator(&self) -> Option<Address> {
        self.savings_calculator.get()
    }

    pub fn loan(&self) -> Option<Address> {
        self.loan.get()
    }

    pub fn version(&self) -> u32 {
        self.version.get_or_default()
    }

    pub fn minimum_savings_amount(&self) -> U256 {
        self.minimum_savings_amount.get_or_default()
    }

    pub fn owner(&self) -> Option<Address> {
        self.owner.get()
    }

    // ==========================================
    // Admin
    // ==========================================

    /// Install (or replace) the logic module. The new module stays inert
    /// until `initialize` advances the version onto it.
    pub fn set_loan(&mut self, module: Address) {
        self.require_owner();
        self.require_not_null(module);
        let previous = self.loan.get();
        self.loan.set(module);
        self.env().emit_event(events::LoanChanged {
            previous,
            current: module,
        });
    }

    /// Swap the interest strategy for new deposits and projections
    pub fn set_savings_calculator(&mut self, calculator: Address) {
        self.require_owner();
        self.require_not_null(calculator);
        let previous = self.savings_calculator.get();
        self.savings_calculator.set(calculator);
        self.env().emit_event(events::SavingsCalculatorChanged {
            previous,
            current: calculator,
        });
    }

    /// Hand the market to a new owner
    pub fn transfer_ownership(&mut self, new_owner: Address) {
        self.require_owner();
        let previous_owner = self.owner.get();
        self.owner.set(new_owner);
        self.env().emit_event(events::OwnershipTransferred {
            previous_owner,
            new_owner,
        });
    }

    /// Advance the upgrade state machine onto the installed module.
    ///
    /// The module's declared version must be exactly one past the current
    /// version; version 0 can never initialize, and a version can never
    /// initialize twice. On success the module runs its one-time setup.
    pub fn initialize(&mut self) {
        self.require_owner();
        let module = match self.loan.get() {
            Some(module) => module,
            None => self.env().revert(MarketError::CannotDispatch),
        };
        let mut module_ref = LoanModuleContractRef::new(self.env().clone(), module);
        let declared = module_ref.version();
        if declared == 0 {
            self.env().revert(MarketError::VersionTooLow);
        }
        let current = self.version.get_or_default();
        if declared == current {
            self.env().revert(MarketError::AlreadyInitialized);
        }
        if declared != current + 1 {
            self.env().revert(MarketError::VersionNotContinuous);
        }
        module_ref.initialize();
        self.version.set(declared);
        self.env().emit_event(events::Initialized { version: declared });
    }

    // ==========================================
    // Extended surface (requires an initialized module)
    // ==========================================

    /// Deposit with an auxiliary payload. A payload tagged `0x01` embeds an
    /// invitation code + signature and redeems it for the caller first;
    /// any other payload requires the caller to be redeemed already.
    pub fn deposit_with_data(&mut self, amount: U256, data: Bytes) {
        self.enter_guard();
        self.require_dispatchable();
        let caller = self.env().caller();

        if !data.is_empty() && data[0] == DATA_TAG_CODE {
            let body = &data[1..];
            let (inviter, nonce) = self.invitations.parse_code(body);
            let code = Bytes::from(body[..CODE_LENGTH].to_vec());
            let envelope = Bytes::from(body[CODE_LENGTH..].to_vec());
            self.invitations.verify_code(&code, &envelope, inviter);
            let inviter_balance = self.savings_amount_of(inviter);
            self.invitations
                .redeem(caller, inviter, nonce, code, inviter_balance);
        } else if !self.invitations.is_redeemed(caller) {
            self.env().revert(MarketError::NotRedeemedUser);
        }

        self.deposit_into_record(caller, amount);
        self.exit_guard();
    }

    /// Redeem an invitation code signed by its inviter
    pub fn redeem(&mut self, code: Bytes, signature: Bytes) {
        self.enter_guard();
        self.require_dispatchable();
        let caller = self.env().caller();
        if code.len() != CODE_LENGTH {
            self.env().revert(InvitationError::InvalidData);
        }
        let (inviter, nonce) = self.invitations.parse_code(&code);
        self.invitations.verify_code(&code, &signature, inviter);
        let inviter_balance = self.savings_amount_of(inviter);
        self.invitations
            .redeem(caller, inviter, nonce, code, inviter_balance);
        self.exit_guard();
    }

    /// Floor on deposit amounts; zero disables it
    pub fn set_minimum_savings_amount(&mut self, amount: U256) {
        self.require_dispatchable();
        self.require_owner();
        let from = self.minimum_savings_amount.get_or_default();
        self.minimum_savings_amount.set(amount);
        self.env()
            .emit_event(events::MinimumSavingsAmountChanged { from, to: amount });
    }

    /// Savings an inviter must hold per redeemable invitation
    pub fn set_amount_of_savings_per_invite(&mut self, amount: U256) {
        self.require_dispatchable();
        self.require_owner();
        self.invitations.set_amount_per_invite(amount);
    }

    /// Strategy swap carrying a routing payload for multi-strategy pools.
    /// The payload is accepted and currently unused.
    pub fn set_savings_calculator_with_data(&mut self, calculator: Address, data: Bytes) {
        self.require_dispatchable();
        let _ = data;
        self.set_savings_calculator(calculator);
    }

    /// `get_savings_record` with a routing payload (accepted, unused)
    pub fn get_savings_record_with_data(&self, record_id: u64, data: Bytes) -> SavingsRecord {
        self.require_dispatchable();
        let _ = data;
        self.get_savings_record(record_id)
    }

    /// `get_savings_records` with a routing payload (accepted, unused)
    pub fn get_savings_records_with_data(&self, owner: Address, data: Bytes) -> Vec<SavingsRecord> {
        self.require_dispatchable();
        let _ = data;
        self.get_savings_records(owner)
    }

    /// `get_savings_record_ids` with a routing payload (accepted, unused)
    pub fn get_savings_record_ids_with_data(&self, owner: Address, data: Bytes) -> Vec<u64> {
        self.require_dispatchable();
        let _ = data;
        self.get_savings_record_ids(owner)
    }

    // ==========================================
    // Invitation views
    // ==========================================

    pub fn amount_of_savings_per_invite(&self) -> U256 {
        self.require_dispatchable();
        self.invitations.amount_per_invite()
    }

    /// Invitations `inviter` may still hand out, computed from live savings
    pub fn invitation_slots(&self, inviter: Address) -> u32 {
        self.require_dispatchable();
        self.invitations.slots(self.savings_amount_of(inviter))
    }

    pub fn is_redeemed(&self, account: Address) -> bool {
        self.require_dispatchable();
        self.invitations.is_redeemed(account)
    }

    pub fn inviter_of(&self, account: Address) -> Option<Address> {
        self.require_dispatchable();
        self.invitations.inviter_of(account)
    }

    pub fn redeemers(&self, inviter: Address) -> Vec<Address> {
        self.require_dispatchable();
        self.invitations.redeemers(inviter)
    }

    pub fn redeemer_count(&self, inviter: Address) -> u32 {
        self.require_dispatchable();
        self.invitations.redeemer_count(inviter)
    }

    pub fn total_redeemed(&self) -> u32 {
        self.require_dispatchable();
        self.invitations.total_redeemed()
    }

    // ==========================================
    // Internal: ledger
    // ==========================================

    fn deposit_into_record(&mut self, caller: Address, amount: U256) {
        if amount.is_zero() {
            self.env().revert(MarketError::InvalidAmount);
        }
        let minimum = self.minimum_savings_amount.get_or_default();
        if !minimum.is_zero() && amount < minimum {
            self.env().revert(MarketError::BelowMinimumSavings);
        }

        let rate = self.calculator_ref().get_interest_rate(
            self.total_funds.get_or_default(),
            self.total_borrows(),
            amount,
        );

        self.collect_asset(caller, amount);

        let id = self.next_record_id.get_or_default();
        let record = SavingsRecord {
            id,
            owner: caller,
            interest_rate: rate,
            balance: amount,
            principal: amount,
            initial_timestamp: self.env().get_block_time(),
        };
        self.records.set(&id, record);
        let mut ids = self.record_ids.get(&caller).unwrap_or_default();
        ids.push(id);
        self.record_ids.set(&caller, ids);
        self.next_record_id.set(id + 1);
        self.total_funds
            .set(self.total_funds.get_or_default() + amount);

        self.env().emit_event(events::SavingsDeposited {
            record_id: id,
            owner: caller,
            balance: amount,
            rate,
        });
    }

    fn require_record(&self, record_id: u64) -> SavingsRecord {
        match self.records.get(&record_id) {
            Some(record) => record,
            None => self.env().revert(MarketError::InvalidRecordId),
        }
    }

    /// Stored balance projected for elapsed time. Zero-rate records never
    /// pass through the compounding strategy.
    fn computed_balance(&self, record: &SavingsRecord) -> U256 {
        if record.interest_rate.is_zero() {
            return record.balance;
        }
        let elapsed_ms = self
            .env()
            .get_block_time()
            .saturating_sub(record.initial_timestamp);
        self.calculator_ref().get_expected_balance(
            record.balance,
            record.interest_rate,
            elapsed_ms / MILLIS_PER_SECOND,
        )
    }

    fn annualize(&self, rate: U256) -> U256 {
        if rate.is_zero() {
            return U256::zero();
        }
        let one = U256::from(MULTIPLIER);
        let projected =
            self.calculator_ref()
                .get_expected_balance(one, rate, DAYS_PER_YEAR * SECONDS_PER_DAY);
        projected - one
    }

    // ==========================================
    // Internal: asset transfers
    // ==========================================

    /// Pull `amount` from `from` into custody, normalizing token failures:
    /// missing balance/allowance are rejected up front, a `false` return is
    /// `TransferFailed`, and a claimed success that moved no funds is
    /// `TokenReverted`.
    fn collect_asset(&mut self, from: Address, amount: U256) {
        let this = self.env().self_address();
        let mut asset = self.asset_ref();
        if asset.balance_of(from) < amount {
            self.env().revert(MarketError::InsufficientFunds);
        }
        if asset.allowance(from, this) < amount {
            self.env().revert(MarketError::AllowanceNotMet);
        }
        let custody_before = asset.balance_of(this);
        if !asset.transfer_from(from, this, amount) {
            self.env().revert(MarketError::TransferFailed);
        }
        if asset.balance_of(this) != custody_before + amount {
            self.env().revert(MarketError::TokenReverted);
        }
    }

    /// Push `amount` out of custody to `to`, with the same normalization
    fn release_asset(&mut self, to: Address, amount: U256) {
        let this = self.env().self_address();
        let mut asset = self.asset_ref();
        let custody_before = asset.balance_of(this);
        if !asset.transfer(to, amount) {
            self.env().revert(MarketError::TransferFailed);
        }
        if asset.balance_of(this) != custody_before - amount {
            self.env().revert(MarketError::TokenReverted);
        }
    }

    // ==========================================
    // Internal: guards
    // ==========================================

    fn require_owner(&self) {
        if self.owner.get() != Some(self.env().caller()) {
            self.env().revert(MarketError::NotOwner);
        }
    }

    fn require_not_null(&self, address: Address) {
        if address == Address::Account(AccountHash::new([0u8; 32])) {
            self.env().revert(MarketError::ZeroAddress);
        }
    }

    /// Extended operations exist only once a module is installed and the
    /// version machine has advanced onto it.
    fn require_dispatchable(&self) {
        if self.loan.get().is_none() {
            self.env().revert(MarketError::CannotDispatch);
        }
        if self.version.get_or_default() == 0 {
            self.env().revert(MarketError::NotInitialized);
        }
    }

    fn enter_guard(&mut self) {
        if self.lock.get_or_default() {
            self.env().revert(MarketError::Reentrant);
        }
        self.lock.set(true);
    }

    fn exit_guard(&mut self) {
        self.lock.set(false);
    }

    fn calculator_ref(&self) -> InterestCalculatorContractRef {
        match self.savings_calculator.get() {
            Some(calculator) => InterestCalculatorContractRef::new(self.env().clone(), calculator),
            None => self.env().revert(MarketError::ZeroAddress),
        }
    }

    fn asset_ref(&self) -> FungibleAssetContractRef {
        match self.asset.get() {
            Some(asset) => FungibleAssetContractRef::new(self.env().clone(), asset),
            None => self.env().revert(MarketError::ZeroAddress),
        }
    }
}
