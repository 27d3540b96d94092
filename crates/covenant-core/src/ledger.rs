//! Audit ledger types — §3 `AuditReceipt`, §4.5 hash-chain + Merkle anchoring.

use serde::{Deserialize, Serialize};

use crate::ids::{Hash32Hex, Id, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorType {
    Ds,
    Requester,
    System,
    PolicyEngine,
}

/// One append-only entry in the hash-chained audit ledger.
///
/// `receipt_hash = SHA256(prev_hash || canonical(action, entity_type,
/// entity_id, actor_id, actor_type, timestamp, details_hash))`. The chain
/// is append-only: nothing about a written receipt is ever mutated, and
/// `sequence_number` is strictly increasing with no gaps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditReceipt {
    pub id: Id,
    pub sequence_number: u64,
    pub created_at: Timestamp,

    pub action: String,
    pub entity_type: String,
    pub entity_id: Id,
    pub actor_id: Id,
    pub actor_type: ActorType,
    pub details_hash: Hash32Hex,
    pub prev_hash: Hash32Hex,
    pub receipt_hash: Hash32Hex,
    pub merkle_batch_id: Option<Id>,
}

/// A periodic anchor over a contiguous run of receipts, committing to
/// their Merkle root so any single receipt can later be proven included
/// without replaying the whole chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MerkleBatch {
    pub id: Id,
    pub created_at: Timestamp,

    pub start_sequence: u64,
    pub end_sequence: u64,
    pub merkle_root: Hash32Hex,
    pub leaf_count: u64,
}

/// An inclusion proof for one receipt against a [`MerkleBatch`]'s root:
/// the sibling hash at each level from leaf to root. Verification hashes
/// the running value with each sibling in sorted-byte order, so no
/// left/right side needs to be recorded — sorting before concatenation
/// is what makes the combination order-independent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InclusionProof {
    pub batch_id: Id,
    pub leaf_index: u64,
    pub leaf_hash: Hash32Hex,
    pub siblings: Vec<Hash32Hex>,
}
