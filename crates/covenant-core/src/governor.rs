//! Privacy Governor support types — §4.4 gates: k-anonymity cache,
//! linkage-window tracking, and the `PolicyDecisionReceipt` every gate
//! decision emits.

use serde::{Deserialize, Serialize};

use crate::ids::{Hash32Hex, Id, Timestamp};

/// A cached cohort-size estimate keyed by `SHA-256(canonical(criteria))`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CohortCacheEntry {
    pub criteria_hash: Hash32Hex,
    pub cohort_size: u64,
    pub cached_at: Timestamp,
}

/// One entry in a requester's rolling linkage window, retained long
/// enough to compute Jaccard similarity against subsequent queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkageWindowEntry {
    pub id: Id,
    pub requester_id: Id,
    pub query_hash: Hash32Hex,
    pub criteria_tokens: Vec<String>,
    pub created_at: Timestamp,
}

/// Running linkage counter for a `(requesterId, queryHash)` pair, reset
/// when it ages out of the rolling window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkageCounter {
    pub requester_id: Id,
    pub query_hash: Hash32Hex,
    pub linkage_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateDecision {
    Allow,
    Deny,
}

/// Emitted by every Privacy Governor gate (§4.4): k-anonymity, linkage
/// rate limit, and Privacy Risk Budget.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyDecisionReceipt {
    pub id: Id,
    pub created_at: Timestamp,
    pub gate_type: String,
    pub decision: GateDecision,
    pub reasons: Vec<String>,
    pub policy_version: String,
    pub details_hash: Hash32Hex,
}
