//! Append-only, hash-chained audit ledger (§4.5). A single writer per
//! chain serialises appends; readers are unrestricted, matching the
//! teacher's single-writer-lock-or-optimistic-version discipline for a
//! protected tail.

use std::sync::{Arc, Mutex};

use covenant_core::ids::{now, Id};
use covenant_core::ledger::{ActorType, AuditReceipt};
use covenant_crypto::sha256_hex;
use covenant_events::EventBus;
use covenant_state::StateDb;
use tracing::info;

use crate::error::LedgerError;

/// The fixed predecessor hash for the very first receipt ever appended.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";
const _ASSERT_GENESIS_HASH_LEN: () = assert!(GENESIS_PREV_HASH.len() == 64);

pub struct AuditChain {
    db: Arc<StateDb>,
    events: Arc<EventBus>,
    /// Serialises appends so `prev_hash`/`sequence_number` reads and the
    /// subsequent write are never interleaved across tasks.
    write_lock: Mutex<()>,
}

impl AuditChain {
    pub fn new(db: Arc<StateDb>, events: Arc<EventBus>) -> Self {
        Self {
            db,
            events,
            write_lock: Mutex::new(()),
        }
    }

    pub fn append_receipt(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: Id,
        actor_id: Id,
        actor_type: ActorType,
        details_hash: &str,
    ) -> Result<AuditReceipt, LedgerError> {
        let _guard = self.write_lock.lock().expect("audit chain lock poisoned");

        let sequence_number = self.db.next_sequence("audit_receipts")?;
        let prev_hash = self
            .db
            .last_receipt()?
            .map(|r| r.receipt_hash)
            .unwrap_or_else(|| GENESIS_PREV_HASH.to_string());

        let id = Id::new();
        let created_at = now();
        let payload = format!(
            "{id}|{action}|{created_at}|{actor_id}|{entity_id}|{details_hash}|{prev_hash}"
        );
        let receipt_hash = sha256_hex(payload.as_bytes());

        let receipt = AuditReceipt {
            id,
            sequence_number,
            created_at,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            actor_id,
            actor_type,
            details_hash: details_hash.to_string(),
            prev_hash,
            receipt_hash,
            merkle_batch_id: None,
        };
        self.db.put_receipt(&receipt)?;
        self.events.publish(
            "audit.receipt_appended",
            "AuditReceipt",
            receipt.id,
            serde_json::json!({
                "sequence_number": receipt.sequence_number,
                "action": receipt.action,
                "entity_type": receipt.entity_type,
            }),
        )?;
        info!(sequence_number, action, "appended audit receipt");
        Ok(receipt)
    }

    /// Recomputes `receiptHash` for the receipt at `sequence_number` and
    /// confirms its link to the previous receipt.
    pub fn verify_receipt_integrity(&self, sequence_number: u64) -> Result<bool, LedgerError> {
        let receipt = self
            .db
            .get_receipt(sequence_number)?
            .ok_or(LedgerError::IntegrityFailure(sequence_number))?;

        let expected_prev = if sequence_number == 0 {
            GENESIS_PREV_HASH.to_string()
        } else {
            self.db
                .get_receipt(sequence_number - 1)?
                .map(|r| r.receipt_hash)
                .ok_or(LedgerError::IntegrityFailure(sequence_number))?
        };
        if receipt.prev_hash != expected_prev {
            return Ok(false);
        }

        let payload = format!(
            "{}|{}|{}|{}|{}|{}|{}",
            receipt.id,
            receipt.action,
            receipt.created_at,
            receipt.actor_id,
            receipt.entity_id,
            receipt.details_hash,
            receipt.prev_hash
        );
        let recomputed = sha256_hex(payload.as_bytes());
        Ok(recomputed == receipt.receipt_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(name: &str) -> (Arc<StateDb>, Arc<EventBus>) {
        let dir = std::env::temp_dir().join(format!("covenant_ledger_chain_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).unwrap());
        let events = Arc::new(EventBus::new(db.clone(), 5));
        (db, events)
    }

    #[test]
    fn first_receipt_chains_to_genesis() {
        let (db, events) = setup("first");
        let chain = AuditChain::new(db, events);
        let receipt = chain
            .append_receipt("test.action", "Request", Id::new(), Id::new(), ActorType::System, "deadbeef")
            .unwrap();
        assert_eq!(receipt.prev_hash, GENESIS_PREV_HASH);
        assert_eq!(receipt.sequence_number, 0);
    }

    #[test]
    fn successive_receipts_chain_correctly() {
        let (db, events) = setup("chain");
        let chain = AuditChain::new(db, events);
        let first = chain
            .append_receipt("a", "R", Id::new(), Id::new(), ActorType::System, "h1")
            .unwrap();
        let second = chain
            .append_receipt("b", "R", Id::new(), Id::new(), ActorType::System, "h2")
            .unwrap();
        assert_eq!(second.prev_hash, first.receipt_hash);
        assert_eq!(second.sequence_number, first.sequence_number + 1);
    }

    #[test]
    fn integrity_check_passes_for_untampered_chain() {
        let (db, events) = setup("integrity_ok");
        let chain = AuditChain::new(db, events);
        chain
            .append_receipt("a", "R", Id::new(), Id::new(), ActorType::System, "h1")
            .unwrap();
        assert!(chain.verify_receipt_integrity(0).unwrap());
    }

    #[test]
    fn integrity_check_fails_when_receipt_tampered() {
        let (db, events) = setup("integrity_bad");
        let chain = AuditChain::new(db.clone(), events);
        let mut receipt = chain
            .append_receipt("a", "R", Id::new(), Id::new(), ActorType::System, "h1")
            .unwrap();
        receipt.details_hash = "tampered".to_string();
        db.put_receipt(&receipt).unwrap();
        assert!(!chain.verify_receipt_integrity(0).unwrap());
    }
}
