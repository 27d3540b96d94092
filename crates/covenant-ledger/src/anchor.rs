//! Periodic Merkle anchoring over contiguous runs of receipts (§4.5).

use std::sync::Arc;

use covenant_core::ids::{now, Id};
use covenant_core::ledger::{InclusionProof, MerkleBatch};
use covenant_crypto::merkle::MerkleTree;
use covenant_crypto::verify_inclusion;
use covenant_state::StateDb;
use tracing::info;

use crate::error::LedgerError;

pub struct Anchorer {
    db: Arc<StateDb>,
}

impl Anchorer {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self { db }
    }

    /// Selects every receipt appended since the last anchored sequence
    /// and commits them to one Merkle root.
    pub fn anchor_batch(&self) -> Result<MerkleBatch, LedgerError> {
        let last_anchored_end = self
            .db
            .get_meta_last_anchored_sequence()?
            .map(|s| s + 1)
            .unwrap_or(0);
        let total = self.db.receipt_count();
        if last_anchored_end >= total {
            return Err(LedgerError::NothingToAnchor);
        }

        let receipts = self.db.iter_receipts_range(last_anchored_end, total.saturating_sub(1))?;
        if receipts.is_empty() {
            return Err(LedgerError::NothingToAnchor);
        }

        let leaf_hashes: Vec<[u8; 32]> = receipts
            .iter()
            .map(|r| {
                let mut bytes = [0u8; 32];
                let decoded = hex::decode(&r.receipt_hash).unwrap_or_default();
                bytes[..decoded.len().min(32)].copy_from_slice(&decoded[..decoded.len().min(32)]);
                bytes
            })
            .collect();
        let tree = MerkleTree::build_from_hashes(&leaf_hashes);

        let batch = MerkleBatch {
            id: Id::new(),
            created_at: now(),
            start_sequence: receipts.first().unwrap().sequence_number,
            end_sequence: receipts.last().unwrap().sequence_number,
            merkle_root: tree.root_hex(),
            leaf_count: receipts.len() as u64,
        };
        self.db.put_merkle_batch(&batch)?;

        for (i, mut receipt) in receipts.into_iter().enumerate() {
            receipt.merkle_batch_id = Some(batch.id);
            self.db.put_receipt(&receipt)?;
            let proof = tree.proof(i).expect("leaf index within bounds");
            let inclusion = InclusionProof {
                batch_id: batch.id,
                leaf_index: i as u64,
                leaf_hash: receipt.receipt_hash.clone(),
                siblings: proof.iter().map(hex::encode).collect(),
            };
            self.db.put_inclusion_proof(&inclusion)?;
        }

        self.db
            .put_meta_last_anchored_sequence(batch.end_sequence)?;
        info!(
            batch_id = %batch.id,
            leaf_count = batch.leaf_count,
            "anchored receipt batch"
        );
        Ok(batch)
    }

    pub fn verify_inclusion_proof(
        &self,
        receipt_hash_hex: &str,
        proof: &InclusionProof,
        expected_root_hex: &str,
    ) -> bool {
        let decode32 = |s: &str| -> Option<[u8; 32]> {
            let bytes = hex::decode(s).ok()?;
            bytes.try_into().ok()
        };
        let Some(leaf) = decode32(receipt_hash_hex) else {
            return false;
        };
        let Some(root) = decode32(expected_root_hex) else {
            return false;
        };
        let siblings: Option<Vec<[u8; 32]>> = proof.siblings.iter().map(|s| decode32(s)).collect();
        let Some(siblings) = siblings else {
            return false;
        };
        verify_inclusion(&leaf, &siblings, &root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::AuditChain;
    use covenant_core::ledger::ActorType;
    use covenant_events::EventBus;

    fn setup(name: &str) -> (Arc<StateDb>, Arc<EventBus>) {
        let dir = std::env::temp_dir().join(format!("covenant_ledger_anchor_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).unwrap());
        let events = Arc::new(EventBus::new(db.clone(), 5));
        (db, events)
    }

    #[test]
    fn anchors_every_appended_receipt_and_proofs_verify() {
        let (db, events) = setup("basic");
        let chain = AuditChain::new(db.clone(), events);
        for i in 0..5 {
            chain
                .append_receipt("a", "R", Id::new(), Id::new(), ActorType::System, &format!("h{i}"))
                .unwrap();
        }

        let anchorer = Anchorer::new(db.clone());
        let batch = anchorer.anchor_batch().unwrap();
        assert_eq!(batch.leaf_count, 5);

        for i in 0..5u64 {
            let receipt = db.get_receipt(i).unwrap().unwrap();
            let proof = db.get_inclusion_proof(&batch.id, i).unwrap().unwrap();
            assert!(anchorer.verify_inclusion_proof(&receipt.receipt_hash, &proof, &batch.merkle_root));
        }
    }

    #[test]
    fn anchoring_twice_with_nothing_new_errors() {
        let (db, events) = setup("twice");
        let chain = AuditChain::new(db.clone(), events);
        chain
            .append_receipt("a", "R", Id::new(), Id::new(), ActorType::System, "h")
            .unwrap();
        let anchorer = Anchorer::new(db);
        anchorer.anchor_batch().unwrap();
        assert!(matches!(anchorer.anchor_batch(), Err(LedgerError::NothingToAnchor)));
    }

    #[test]
    fn second_batch_only_covers_newly_appended_receipts() {
        let (db, events) = setup("incremental");
        let chain = AuditChain::new(db.clone(), events);
        chain
            .append_receipt("a", "R", Id::new(), Id::new(), ActorType::System, "h0")
            .unwrap();
        let anchorer = Anchorer::new(db.clone());
        anchorer.anchor_batch().unwrap();

        chain
            .append_receipt("b", "R", Id::new(), Id::new(), ActorType::System, "h1")
            .unwrap();
        let second_batch = anchorer.anchor_batch().unwrap();
        assert_eq!(second_batch.leaf_count, 1);
        assert_eq!(second_batch.start_sequence, 1);
    }
}
