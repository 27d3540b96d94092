//! YC (Yield Credit) issuance, redemption, clawback, and the
//! non-transferability gate (§4.6). Every operation is fenced by a
//! journal idempotency key so a retried call observes the prior result
//! instead of double-applying.

use std::sync::Arc;

use covenant_core::ids::{now, Id};
use covenant_core::ledger::ActorType;
use covenant_core::settlement::{EscrowAccount, JournalEntry, JournalEntryType, YcToken};
use covenant_ledger::AuditChain;
use covenant_state::StateDb;
use tracing::{info, warn};

use crate::error::SettlementError;

pub struct CreditsEngine {
    db: Arc<StateDb>,
    ledger: Arc<AuditChain>,
    transfers_enabled: bool,
}

impl CreditsEngine {
    pub fn new(db: Arc<StateDb>, ledger: Arc<AuditChain>, transfers_enabled: bool) -> Self {
        Self {
            db,
            ledger,
            transfers_enabled,
        }
    }

    fn load_or_init(&self, ds_id: Id) -> Result<YcToken, SettlementError> {
        Ok(self.db.get_yc_token(&ds_id)?.unwrap_or(YcToken {
            account_id: ds_id,
            version: 0,
            balance: 0,
            lifetime_earned: 0,
            transfers_enabled: self.transfers_enabled,
        }))
    }

    /// Issuance key: `ISSUE:<settlementId>:<dsId>`. Requires the escrow to
    /// have released at least `amount` to this DS already.
    pub fn issue_from_settlement(
        &self,
        escrow_id: Id,
        ds_id: Id,
        amount: u64,
        settlement_id: Id,
    ) -> Result<YcToken, SettlementError> {
        let idempotency_key = format!("ISSUE:{settlement_id}:{ds_id}");
        if self.db.journal_entry_with_idempotency_key(&idempotency_key)?.is_some() {
            return self.db.get_yc_token(&ds_id)?.ok_or(SettlementError::DsBalanceNotFound(ds_id));
        }

        let escrow = self.db.get_escrow(&escrow_id)?.ok_or(SettlementError::EscrowNotFound(escrow_id))?;
        if escrow.released_amount < amount {
            return Err(SettlementError::InsufficientEscrowFunds(escrow_id));
        }

        let mut token = self.load_or_init(ds_id)?;
        token.balance += amount;
        token.lifetime_earned += amount;
        token.version += 1;
        self.db.put_yc_token(&token)?;

        self.post_journal_entry(JournalEntryType::YcMint, "YC_POOL", &format!("YC:{ds_id}"), amount, escrow_id, &idempotency_key)?;
        self.ledger.append_receipt(
            "yc.issued",
            "YcToken",
            escrow_id,
            ds_id,
            ActorType::System,
            &covenant_crypto::sha256_hex(format!("{escrow_id}|{ds_id}|{amount}").as_bytes()),
        )?;
        info!(ds_id = %ds_id, amount, "YC credits issued");
        Ok(token)
    }

    /// Redemption key: `REDEEM:<payoutId>:<dsId>`.
    pub fn redeem_for_payout(&self, ds_id: Id, amount: u64, payout_id: Id) -> Result<YcToken, SettlementError> {
        let idempotency_key = format!("REDEEM:{payout_id}:{ds_id}");
        if self.db.journal_entry_with_idempotency_key(&idempotency_key)?.is_some() {
            return self.db.get_yc_token(&ds_id)?.ok_or(SettlementError::DsBalanceNotFound(ds_id));
        }

        let mut token = self.load_or_init(ds_id)?;
        if token.balance < amount {
            return Err(SettlementError::InsufficientBalance(ds_id));
        }

        token.balance -= amount;
        token.version += 1;
        self.db.put_yc_token(&token)?;

        self.post_journal_entry(JournalEntryType::YcRedeem, &format!("YC:{ds_id}"), "YC_POOL", amount, payout_id, &idempotency_key)?;
        self.ledger.append_receipt(
            "yc.redeemed",
            "YcToken",
            payout_id,
            ds_id,
            ActorType::Ds,
            &covenant_crypto::sha256_hex(format!("{payout_id}|{ds_id}|{amount}").as_bytes()),
        )?;
        Ok(token)
    }

    /// Clawback key: `CLAWBACK:<disputeId>:<dsId>`.
    pub fn clawback(&self, ds_id: Id, amount: u64, dispute_id: Id) -> Result<YcToken, SettlementError> {
        let idempotency_key = format!("CLAWBACK:{dispute_id}:{ds_id}");
        if self.db.journal_entry_with_idempotency_key(&idempotency_key)?.is_some() {
            return self.db.get_yc_token(&ds_id)?.ok_or(SettlementError::DsBalanceNotFound(ds_id));
        }

        let mut token = self.load_or_init(ds_id)?;
        if token.balance < amount {
            return Err(SettlementError::InsufficientBalance(ds_id));
        }
        token.balance -= amount;
        token.version += 1;
        self.db.put_yc_token(&token)?;

        self.post_journal_entry(JournalEntryType::YcClawback, &format!("YC:{ds_id}"), "YC_POOL", amount, dispute_id, &idempotency_key)?;
        self.ledger.append_receipt(
            "yc.clawback",
            "YcToken",
            dispute_id,
            ds_id,
            ActorType::System,
            &covenant_crypto::sha256_hex(format!("{dispute_id}|{ds_id}|{amount}").as_bytes()),
        )?;
        Ok(token)
    }

    /// YC credits are non-transferable unless governance has flipped
    /// `transfers_enabled`. A rejection still emits an audit receipt
    /// (Testable Property 8).
    pub fn attempt_transfer(&self, from_ds: Id, to_ds: Id, amount: u64) -> Result<(), SettlementError> {
        if !self.transfers_enabled {
            self.ledger.append_receipt(
                "yc.transfer_rejected",
                "YcToken",
                from_ds,
                from_ds,
                ActorType::Ds,
                &covenant_crypto::sha256_hex(format!("{from_ds}|{to_ds}|{amount}").as_bytes()),
            )?;
            warn!(from_ds = %from_ds, to_ds = %to_ds, "YC transfer rejected: transfers disabled");
            return Err(SettlementError::YcTransferDisabled);
        }

        let mut sender = self.load_or_init(from_ds)?;
        if sender.balance < amount {
            return Err(SettlementError::InsufficientBalance(from_ds));
        }
        let mut receiver = self.load_or_init(to_ds)?;

        sender.balance -= amount;
        sender.version += 1;
        receiver.balance += amount;
        receiver.version += 1;
        self.db.put_yc_token(&sender)?;
        self.db.put_yc_token(&receiver)?;

        let idempotency_key = format!("TRANSFER:{}:{from_ds}:{to_ds}", now());
        self.post_journal_entry(
            JournalEntryType::YcTransfer,
            &format!("YC:{from_ds}"),
            &format!("YC:{to_ds}"),
            amount,
            from_ds,
            &idempotency_key,
        )?;
        self.ledger.append_receipt(
            "yc.transferred",
            "YcToken",
            from_ds,
            from_ds,
            ActorType::Ds,
            &covenant_crypto::sha256_hex(format!("{from_ds}|{to_ds}|{amount}").as_bytes()),
        )?;
        Ok(())
    }

    /// Sum of ISSUANCE entries referencing `escrow_id` must equal
    /// `escrow.released_amount`.
    pub fn reconcile_escrow(&self, escrow: &EscrowAccount) -> Result<(), SettlementError> {
        let issued: u64 = self
            .db
            .iter_journal_entries()?
            .into_iter()
            .filter(|e| matches!(e.entry_type, JournalEntryType::YcMint) && e.reference_id == escrow.id)
            .map(|e| e.amount)
            .sum();
        if issued != escrow.released_amount {
            return Err(SettlementError::ReconciliationMismatch(escrow.id));
        }
        Ok(())
    }

    fn post_journal_entry(
        &self,
        entry_type: JournalEntryType,
        debit_account: &str,
        credit_account: &str,
        amount: u64,
        reference_id: Id,
        idempotency_key: &str,
    ) -> Result<JournalEntry, SettlementError> {
        let entry = JournalEntry {
            id: Id::new(),
            created_at: now(),
            entry_type,
            debit_account: debit_account.to_string(),
            credit_account: credit_account.to_string(),
            amount,
            reference_id,
            idempotency_key: idempotency_key.to_string(),
        };
        self.db.put_journal_entry(&entry)?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::settlement::EscrowStatus;
    use covenant_events::EventBus;

    fn setup(name: &str, transfers_enabled: bool) -> (CreditsEngine, Arc<StateDb>) {
        let dir = std::env::temp_dir().join(format!("covenant_credits_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).unwrap());
        let events = Arc::new(EventBus::new(db.clone(), 5));
        let ledger = Arc::new(AuditChain::new(db.clone(), events));
        (CreditsEngine::new(db.clone(), ledger, transfers_enabled), db)
    }

    fn released_escrow(db: &StateDb, released_amount: u64) -> EscrowAccount {
        let escrow = EscrowAccount {
            id: Id::new(),
            version: 0,
            created_at: 0,
            requester_id: Id::new(),
            request_id: Id::new(),
            funded_amount: released_amount,
            locked_amount: 0,
            released_amount,
            refunded_amount: 0,
            status: EscrowStatus::Settled,
        };
        db.put_escrow(&escrow).unwrap();
        escrow
    }

    #[test]
    fn issue_then_redeem() {
        let (engine, db) = setup("issue_redeem", false);
        let ds_id = Id::new();
        let escrow = released_escrow(&db, 100);
        let settlement_id = Id::new();
        let token = engine.issue_from_settlement(escrow.id, ds_id, 100, settlement_id).unwrap();
        assert_eq!(token.balance, 100);

        let payout_id = Id::new();
        let token = engine.redeem_for_payout(ds_id, 60, payout_id).unwrap();
        assert_eq!(token.balance, 40);
    }

    #[test]
    fn issue_without_matching_release_rejected() {
        let (engine, db) = setup("under_released", false);
        let escrow = released_escrow(&db, 10);
        let result = engine.issue_from_settlement(escrow.id, Id::new(), 100, Id::new());
        assert!(matches!(result, Err(SettlementError::InsufficientEscrowFunds(_))));
    }

    #[test]
    fn transfer_rejected_when_disabled_but_receipt_emitted() {
        let (engine, _db) = setup("transfer_disabled", false);
        let result = engine.attempt_transfer(Id::new(), Id::new(), 10);
        assert!(matches!(result, Err(SettlementError::YcTransferDisabled)));
    }

    #[test]
    fn transfer_allowed_when_enabled() {
        let (engine, db) = setup("transfer_enabled", true);
        let escrow = released_escrow(&db, 50);
        let from_ds = Id::new();
        engine.issue_from_settlement(escrow.id, from_ds, 50, Id::new()).unwrap();
        let to_ds = Id::new();
        engine.attempt_transfer(from_ds, to_ds, 20).unwrap();
        assert_eq!(db.get_yc_token(&to_ds).unwrap().unwrap().balance, 20);
    }

    #[test]
    fn reconciliation_matches_released_amount() {
        let (engine, db) = setup("reconcile", false);
        let escrow = released_escrow(&db, 100);
        engine.issue_from_settlement(escrow.id, Id::new(), 100, Id::new()).unwrap();
        assert!(engine.reconcile_escrow(&escrow).is_ok());
    }
}
