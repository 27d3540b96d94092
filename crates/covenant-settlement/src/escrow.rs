//! Escrow state machine (§4.6): PENDING -> FUNDED -> LOCKED -> {SETTLED |
//! REFUNDED}. Every transition is driven by a double-entry journal
//! posting carrying a unique `idempotencyKey`; a duplicate posting is a
//! no-op that returns the prior entry instead of re-applying the
//! mutation.

use std::sync::Arc;

use covenant_core::ids::{now, Id};
use covenant_core::ledger::ActorType;
use covenant_core::settlement::{EscrowAccount, EscrowStatus, JournalEntry, JournalEntryType};
use covenant_ledger::AuditChain;
use covenant_state::StateDb;
use tracing::info;

use crate::error::SettlementError;

pub struct EscrowEngine {
    db: Arc<StateDb>,
    ledger: Arc<AuditChain>,
}

impl EscrowEngine {
    pub fn new(db: Arc<StateDb>, ledger: Arc<AuditChain>) -> Self {
        Self { db, ledger }
    }

    pub fn fund(&self, requester_id: Id, request_id: Id, amount: u64, idempotency_key: &str) -> Result<EscrowAccount, SettlementError> {
        if let Some(existing) = self.db.journal_entry_with_idempotency_key(idempotency_key)? {
            if let Some(escrow) = self.db.get_escrow(&existing.reference_id)? {
                return Ok(escrow);
            }
        }

        let escrow = EscrowAccount {
            id: Id::new(),
            version: 0,
            created_at: now(),
            requester_id,
            request_id,
            funded_amount: amount,
            locked_amount: 0,
            released_amount: 0,
            refunded_amount: 0,
            status: EscrowStatus::Funded,
        };
        self.db.put_escrow(&escrow)?;
        self.post_journal_entry(JournalEntryType::EscrowFund, "EXTERNAL:funding", &format!("ESCROW:{}", escrow.id), amount, escrow.id, idempotency_key)?;

        self.ledger.append_receipt(
            "escrow.funded",
            "EscrowAccount",
            escrow.id,
            requester_id,
            ActorType::Requester,
            &covenant_crypto::sha256_hex(format!("{}|{}", escrow.id, amount).as_bytes()),
        )?;
        info!(escrow_id = %escrow.id, amount, "escrow funded");
        Ok(escrow)
    }

    pub fn lock(&self, escrow_id: Id, amount: u64, idempotency_key: &str) -> Result<EscrowAccount, SettlementError> {
        if let Some(existing) = self.db.journal_entry_with_idempotency_key(idempotency_key)? {
            let _ = existing;
            return self.db.get_escrow(&escrow_id)?.ok_or(SettlementError::EscrowNotFound(escrow_id));
        }

        let mut escrow = self.db.get_escrow(&escrow_id)?.ok_or(SettlementError::EscrowNotFound(escrow_id))?;
        if escrow.available() < amount {
            return Err(SettlementError::InsufficientEscrowFunds(escrow_id));
        }

        escrow.locked_amount += amount;
        escrow.status = EscrowStatus::Locked;
        escrow.version += 1;
        self.db.put_escrow(&escrow)?;
        self.post_journal_entry(
            JournalEntryType::EscrowLock,
            &format!("ESCROW:{}", escrow_id),
            &format!("ESCROW:{}:locked", escrow_id),
            amount,
            escrow_id,
            idempotency_key,
        )?;

        self.ledger.append_receipt(
            "escrow.locked",
            "EscrowAccount",
            escrow.id,
            escrow.requester_id,
            ActorType::System,
            &covenant_crypto::sha256_hex(format!("{}|{}", escrow.id, amount).as_bytes()),
        )?;
        Ok(escrow)
    }

    /// Moves `amount` from `locked` to `released`, crediting
    /// `DS_BALANCE:<ds_id>:pending`.
    pub fn release_to_ds(
        &self,
        escrow_id: Id,
        ds_id: Id,
        amount: u64,
        idempotency_key: &str,
    ) -> Result<EscrowAccount, SettlementError> {
        if let Some(_existing) = self.db.journal_entry_with_idempotency_key(idempotency_key)? {
            return self.db.get_escrow(&escrow_id)?.ok_or(SettlementError::EscrowNotFound(escrow_id));
        }

        let mut escrow = self.db.get_escrow(&escrow_id)?.ok_or(SettlementError::EscrowNotFound(escrow_id))?;
        if escrow.locked_amount < amount {
            return Err(SettlementError::InsufficientEscrowFunds(escrow_id));
        }

        escrow.locked_amount -= amount;
        escrow.released_amount += amount;
        if escrow.locked_amount == 0 && escrow.available() == 0 {
            escrow.status = EscrowStatus::Settled;
        }
        escrow.version += 1;
        self.db.put_escrow(&escrow)?;

        let mut balance = self
            .db
            .get_ds_balance(&ds_id)?
            .unwrap_or(covenant_core::settlement::DsBalance {
                account_id: ds_id,
                version: 0,
                available: 0,
                pending: 0,
            });
        balance.pending += amount;
        balance.version += 1;
        self.db.put_ds_balance(&balance)?;

        self.post_journal_entry(
            JournalEntryType::EscrowRelease,
            &format!("ESCROW:{}:locked", escrow_id),
            &format!("DS_BALANCE:{}:pending", ds_id),
            amount,
            escrow_id,
            idempotency_key,
        )?;

        self.ledger.append_receipt(
            "escrow.released",
            "EscrowAccount",
            escrow.id,
            ds_id,
            ActorType::Ds,
            &covenant_crypto::sha256_hex(format!("{}|{}|{}", escrow.id, ds_id, amount).as_bytes()),
        )?;
        Ok(escrow)
    }

    pub fn refund(&self, escrow_id: Id, amount: u64, idempotency_key: &str) -> Result<EscrowAccount, SettlementError> {
        if self.db.journal_entry_with_idempotency_key(idempotency_key)?.is_some() {
            return self.db.get_escrow(&escrow_id)?.ok_or(SettlementError::EscrowNotFound(escrow_id));
        }

        let mut escrow = self.db.get_escrow(&escrow_id)?.ok_or(SettlementError::EscrowNotFound(escrow_id))?;
        if escrow.available() < amount {
            return Err(SettlementError::InsufficientEscrowFunds(escrow_id));
        }

        escrow.refunded_amount += amount;
        escrow.status = EscrowStatus::Refunded;
        escrow.version += 1;
        self.db.put_escrow(&escrow)?;

        self.post_journal_entry(
            JournalEntryType::Refund,
            &format!("ESCROW:{}", escrow_id),
            &format!("REQUESTER:{}", escrow.requester_id),
            amount,
            escrow_id,
            idempotency_key,
        )?;

        self.ledger.append_receipt(
            "escrow.refunded",
            "EscrowAccount",
            escrow.id,
            escrow.requester_id,
            ActorType::System,
            &covenant_crypto::sha256_hex(format!("{}|{}", escrow.id, amount).as_bytes()),
        )?;
        Ok(escrow)
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
    use covenant_events::EventBus;

    fn setup(name: &str) -> (EscrowEngine, Arc<StateDb>) {
        let dir = std::env::temp_dir().join(format!("covenant_escrow_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).unwrap());
        let events = Arc::new(EventBus::new(db.clone(), 5));
        let ledger = Arc::new(AuditChain::new(db.clone(), events));
        (EscrowEngine::new(db.clone(), ledger), db)
    }

    #[test]
    fn fund_lock_release_round_trip() {
        let (engine, _db) = setup("round_trip");
        let requester_id = Id::new();
        let request_id = Id::new();
        let escrow = engine.fund(requester_id, request_id, 100, "FUND:1").unwrap();
        let escrow = engine.lock(escrow.id, 100, "LOCK:1").unwrap();
        assert_eq!(escrow.locked_amount, 100);

        let ds_id = Id::new();
        let escrow = engine.release_to_ds(escrow.id, ds_id, 100, "RELEASE:1").unwrap();
        assert_eq!(escrow.released_amount, 100);
        assert_eq!(escrow.status, EscrowStatus::Settled);
    }

    #[test]
    fn duplicate_idempotency_key_is_a_no_op() {
        let (engine, _db) = setup("dup");
        let escrow = engine.fund(Id::new(), Id::new(), 100, "FUND:dup").unwrap();
        let repeat = engine.fund(Id::new(), Id::new(), 100, "FUND:dup").unwrap();
        assert_eq!(escrow.id, repeat.id);
    }

    #[test]
    fn lock_beyond_available_rejected() {
        let (engine, _db) = setup("overlock");
        let escrow = engine.fund(Id::new(), Id::new(), 50, "FUND:over").unwrap();
        assert!(matches!(
            engine.lock(escrow.id, 100, "LOCK:over"),
            Err(SettlementError::InsufficientEscrowFunds(_))
        ));
    }

    #[test]
    fn refund_remainder_after_partial_release() {
        let (engine, _db) = setup("refund");
        let escrow = engine.fund(Id::new(), Id::new(), 100, "FUND:refund").unwrap();
        let escrow = engine.lock(escrow.id, 60, "LOCK:refund").unwrap();
        let escrow = engine.release_to_ds(escrow.id, Id::new(), 60, "RELEASE:refund").unwrap();
        let escrow = engine.refund(escrow.id, 40, "REFUND:refund").unwrap();
        assert_eq!(escrow.available(), 0);
    }
}
