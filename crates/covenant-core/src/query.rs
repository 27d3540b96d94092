//! Query plan & Time Capsule types — §3 `QueryPlan`, `TimeCapsule`.

use serde::{Deserialize, Serialize};

use crate::ids::{Hash32Hex, Id, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Pending,
    Dispatched,
    Executed,
    Expired,
}

/// A signed, time-bounded specification dispatched to eligible devices.
///
/// The signature covers a canonical serialisation of every field below
/// except `signature` itself — see `covenant_crypto::canonical` for the
/// exact encoding and `covenant-orchestrator` for sign/verify.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryPlan {
    pub id: Id,
    pub version: u64,
    pub created_at: Timestamp,

    pub request_id: Id,
    pub contract_id: Id,
    pub scope_hash: Hash32Hex,
    pub allowed_transforms: Vec<String>,
    pub output_restrictions: Vec<String>,
    pub permitted_fields: Vec<String>,
    pub compensation: u64,
    pub ttl: Timestamp,
    pub signature: Vec<u8>,
    pub signed_at: Timestamp,
    pub signing_key_id: String,
    pub status: PlanStatus,
}

impl QueryPlan {
    /// The deterministic canonical string signed over — every field
    /// above except `signature`, pipe-joined in declaration order, as
    /// specified in §4.4.
    pub fn signable_payload(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.id,
            self.request_id,
            self.contract_id,
            self.scope_hash,
            self.allowed_transforms.join(","),
            self.output_restrictions.join(","),
            self.permitted_fields.join(","),
            self.compensation,
            self.ttl,
        )
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.ttl
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapsuleStatus {
    Created,
    Delivered,
    Expired,
    Shredded,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapsuleSummary {
    pub record_count: u64,
    pub field_names: Vec<String>,
    pub payload_size_bytes: u64,
    pub output_mode: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapsuleHeader {
    pub capsule_id: Id,
    pub plan_id: Id,
    pub contract_id: Id,
    pub ttl: Timestamp,
    pub schema_version: String,
    pub summary: CapsuleSummary,
    pub ds_node_id: Id,
    pub requester_id: Id,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapsuleProofs {
    pub capsule_hash: Hash32Hex,
    pub ds_signature: Vec<u8>,
    pub contract_id: Id,
    pub plan_hash: Hash32Hex,
    pub signed_at: Timestamp,
}

/// A TTL-bound encrypted response produced by a device, subject to
/// crypto-shred. The payload is opaque AES-256-GCM ciphertext; only
/// `covenant-orchestrator`'s `KeyStore` can ever decrypt it, and only
/// until the key is shredded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeCapsule {
    pub id: Id,
    pub version: u64,
    pub created_at: Timestamp,

    pub contract_id: Id,
    pub plan_id: Id,
    pub field_manifest_hash: Hash32Hex,
    pub encrypted_payload: Vec<u8>,
    pub encryption_key_id: String,
    pub ttl: Timestamp,
    pub nonce: [u8; 12],
    pub status: CapsuleStatus,
    pub delivered_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,

    pub header: CapsuleHeader,
    pub proofs: CapsuleProofs,
}

impl TimeCapsule {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.ttl
    }
}
