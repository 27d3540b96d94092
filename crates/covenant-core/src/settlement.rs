//! Settlement types — §3 `EscrowAccount`, `JournalEntry`, `DSBalance`,
//! `YCToken`, `PRB` (Privacy Resource Budget).

use serde::{Deserialize, Serialize};

use crate::ids::{Id, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    Pending,
    Funded,
    Locked,
    Settled,
    Refunded,
}

/// Holds a requester's committed budget for one `Request` until
/// participants are paid out or the remainder is refunded.
///
/// Invariant: `locked_amount + released_amount + refunded_amount <=
/// funded_amount` at all times.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscrowAccount {
    pub id: Id,
    pub version: u64,
    pub created_at: Timestamp,

    pub requester_id: Id,
    pub request_id: Id,
    pub funded_amount: u64,
    pub locked_amount: u64,
    pub released_amount: u64,
    pub refunded_amount: u64,
    pub status: EscrowStatus,
}

impl EscrowAccount {
    pub fn available(&self) -> u64 {
        self.funded_amount
            .saturating_sub(self.locked_amount)
            .saturating_sub(self.released_amount)
            .saturating_sub(self.refunded_amount)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntryType {
    EscrowFund,
    EscrowLock,
    EscrowRelease,
    Refund,
    YcMint,
    YcRedeem,
    YcClawback,
    YcTransfer,
}

/// One immutable double-entry journal line. Every balance-affecting
/// operation in settlement writes exactly one of these before (and in the
/// same staged transaction as) the balance mutation it records —
/// `idempotency_key` lets a retried request detect it already ran.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Id,
    pub created_at: Timestamp,

    pub entry_type: JournalEntryType,
    pub debit_account: String,
    pub credit_account: String,
    pub amount: u64,
    pub reference_id: Id,
    pub idempotency_key: String,
}

/// A requester's or DS's settlement-currency balance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DsBalance {
    pub account_id: Id,
    pub version: u64,
    pub available: u64,
    pub pending: u64,
}

/// A non-transferable (unless explicitly enabled) Yield Credit balance
/// earned through participation, tracked per-DS rather than as a bearer
/// token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YcToken {
    pub account_id: Id,
    pub version: u64,
    pub balance: u64,
    pub lifetime_earned: u64,
    pub transfers_enabled: bool,
}

/// Privacy Resource Budget: the finite pool of "queries this DS may be
/// included in" that `covenant-governor` debits per dispatch and that
/// refills on its own rolling-window schedule — modeled directly on a
/// rolling-window rate tracker, not on a monetary balance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prb {
    pub ds_id: Id,
    pub version: u64,
    pub allocated: f64,
    pub consumed: f64,
    pub window_start: Timestamp,
    /// Once locked, `allocated` is immutable — only `consumed` may change.
    pub is_locked: bool,
}

impl Prb {
    pub fn remaining(&self) -> f64 {
        (self.allocated - self.consumed).max(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutStatus {
    Pending,
    Completed,
    Failed,
}

/// A requested cash-out against a DS's available YC balance. The raw
/// destination (bank account, wallet address, ...) never reaches this
/// type — only its hash, per the platform's "destination PII never
/// leaves the caller" contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayoutInstruction {
    pub id: Id,
    pub version: u64,
    pub created_at: Timestamp,

    pub ds_id: Id,
    pub amount: u64,
    pub method: String,
    pub destination_hash: crate::ids::Hash32Hex,
    pub status: PayoutStatus,
}
