//! Invitation code redemption.
//!
//! An invitation code is 40 bytes: the inviter's 32-byte account hash
//! followed by a big-endian `u64` nonce. Codes are signed by the inviter;
//! because Casper cannot recover a signer from a signature alone, the
//! signer's public key travels in front of the signature bytes and is
//! checked against the inviter encoded in the code.
//!
//! The gate owns the redemption bookkeeping only. Ledger balances are
//! injected by the market, so eligibility always reflects live savings.

use alloc::vec::Vec;
use odra::casper_types::account::AccountHash;
use odra::casper_types::bytesrepr::{Bytes, FromBytes};
use odra::casper_types::{PublicKey, U256};
use odra::prelude::*;

/// Inviter account hash (32) + nonce (8)
pub const CODE_LENGTH: usize = 40;
/// Payload tag marking an embedded code in `deposit_with_data`
pub const DATA_TAG_CODE: u8 = 0x01;

// ==========================================
// Events
// ==========================================

pub mod events {
    use odra::casper_types::bytesrepr::Bytes;
    use odra::casper_types::U256;
    use odra::prelude::*;

    #[odra::event]
    pub struct InvitationCodeUsed {
        pub inviter: Address,
        pub code: Bytes,
        pub account: Address,
    }

    #[odra::event]
    pub struct AmountOfSavingsPerInviteChanged {
        pub from: U256,
        pub to: U256,
    }
}

// ==========================================
// Errors
// ==========================================

#[odra::odra_error]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvitationError {
    WrongCode = 300,
    AlreadyRedeemedUser = 301,
    MaxCountReached = 302,
    CodeAlreadyUsed = 303,
    AmountIsZero = 304,
    InvalidData = 305,
    InvalidInviter = 306,
    InvalidNonce = 307,
}

// ==========================================
// Gate
// ==========================================

/// Redemption state, keyed per inviter and per invitee.
#[odra::module(events = [events::InvitationCodeUsed, events::AmountOfSavingsPerInviteChanged], errors = InvitationError)]
pub struct InvitationGate {
    amount_per_invite: Var<U256>,
    redeemed: Mapping<Address, bool>,
    inviter_of: Mapping<Address, Address>,
    redeemers: Mapping<Address, Vec<Address>>,
    redeemer_count: Mapping<Address, u32>,
    total_redeemed: Var<u32>,
    used_codes: Mapping<(Address, u64), bool>,
}

impl InvitationGate {
    pub fn amount_per_invite(&self) -> U256 {
        self.amount_per_invite.get_or_default()
    }

    /// Owner gating happens in the market; the gate validates and records.
    pub fn set_amount_per_invite(&mut self, amount: U256) {
        if amount.is_zero() {
            self.env().revert(InvitationError::AmountIsZero);
        }
        let previous = self.amount_per_invite.get_or_default();
        self.amount_per_invite.set(amount);
        self.env().emit_event(events::AmountOfSavingsPerInviteChanged {
            from: previous,
            to: amount,
        });
    }

    /// Slots an inviter has earned with `ledger_balance` of savings. Zero
    /// while no per-invite amount is configured.
    pub fn slots(&self, ledger_balance: U256) -> u32 {
        let per_invite = self.amount_per_invite.get_or_default();
        if per_invite.is_zero() {
            return 0;
        }
        let slots = ledger_balance / per_invite;
        if slots > U256::from(u32::MAX) {
            u32::MAX
        } else {
            slots.as_u32()
        }
    }

    pub fn is_redeemed(&self, account: Address) -> bool {
        self.redeemed.get(&account).unwrap_or_default()
    }

    pub fn inviter_of(&self, account: Address) -> Option<Address> {
        self.inviter_of.get(&account)
    }

    pub fn redeemers(&self, inviter: Address) -> Vec<Address> {
        self.redeemers.get(&inviter).unwrap_or_default()
    }

    pub fn redeemer_count(&self, inviter: Address) -> u32 {
        self.redeemer_count.get(&inviter).unwrap_or_default()
    }

    pub fn total_redeemed(&self) -> u32 {
        self.total_redeemed.get_or_default()
    }

    /// Decode an invitation code from the front of `raw`.
    ///
    /// Failure order matches the redemption surface: too short to carry an
    /// inviter, an all-zero inviter, then a truncated or zero nonce.
    pub fn parse_code(&self, raw: &[u8]) -> (Address, u64) {
        if raw.len() < 32 {
            self.env().revert(InvitationError::InvalidData);
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&raw[..32]);
        if hash == [0u8; 32] {
            self.env().revert(InvitationError::InvalidInviter);
        }
        if raw.len() < CODE_LENGTH {
            self.env().revert(InvitationError::InvalidNonce);
        }
        let mut nonce_bytes = [0u8; 8];
        nonce_bytes.copy_from_slice(&raw[32..CODE_LENGTH]);
        let nonce = u64::from_be_bytes(nonce_bytes);
        if nonce == 0 {
            self.env().revert(InvitationError::InvalidNonce);
        }
        (Address::Account(AccountHash::new(hash)), nonce)
    }

    /// Check the signature envelope (serialized public key + signature) over
    /// the code bytes, and that the signer is the encoded inviter.
    pub fn verify_code(&self, code: &Bytes, envelope: &Bytes, inviter: Address) {
        let (public_key, signature_bytes) = match PublicKey::from_bytes(envelope) {
            Ok(parsed) => parsed,
            Err(_) => self.env().revert(InvitationError::WrongCode),
        };
        if Address::Account(public_key.to_account_hash()) != inviter {
            self.env().revert(InvitationError::WrongCode);
        }
        let signature = Bytes::from(signature_bytes.to_vec());
        if !self.env().verify_signature(code, &signature, &public_key) {
            self.env().revert(InvitationError::WrongCode);
        }
    }

    /// Record a redemption for `account`. `inviter_balance` is the inviter's
    /// live ledger balance as supplied by the market.
    pub fn redeem(
        &mut self,
        account: Address,
        inviter: Address,
        nonce: u64,
        code: Bytes,
        inviter_balance: U256,
    ) {
        if self.is_redeemed(account) {
            self.env().revert(InvitationError::AlreadyRedeemedUser);
        }
        let count = self.redeemer_count.get(&inviter).unwrap_or_default();
        if count >= self.slots(inviter_balance) {
            self.env().revert(InvitationError::MaxCountReached);
        }
        if self.used_codes.get(&(inviter, nonce)).unwrap_or_default() {
            self.env().revert(InvitationError::CodeAlreadyUsed);
        }

        self.redeemed.set(&account, true);
        self.inviter_of.set(&account, inviter);
        let mut list = self.redeemers.get(&inviter).unwrap_or_default();
        list.push(account);
        self.redeemers.set(&inviter, list);
        self.redeemer_count.set(&inviter, count + 1);
        self.total_redeemed
            .set(self.total_redeemed.get_or_default() + 1);
        self.used_codes.set(&(inviter, nonce), true);

        self.env().emit_event(events::InvitationCodeUsed {
            inviter,
            code,
            account,
        });
    }
}
