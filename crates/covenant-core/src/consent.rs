//! Consent contract & obligation types — §3 `ConsentContract`,
//! `ConsentObligation`, `ObligationViolation`.

use serde::{Deserialize, Serialize};

use crate::ids::{Hash32Hex, Id, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentStatus {
    Active,
    Revoked,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    CleanRoom,
    Direct,
    Encrypted,
}

/// A cryptographically bound agreement governing scope, purpose,
/// duration, compensation, and obligations for one DS/requester/request
/// triple.
///
/// Invariant: `duration_end > duration_start`; once `Revoked`, `status` is
/// terminal — no further transition is accepted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsentContract {
    pub id: Id,
    pub version: u64,
    pub created_at: Timestamp,

    pub ds_id: Id,
    pub requester_id: Id,
    pub request_id: Id,
    pub scope_hash: Hash32Hex,
    pub purpose_hash: Hash32Hex,
    pub duration_start: Timestamp,
    pub duration_end: Timestamp,
    pub compensation_amount: u64,
    pub status: ConsentStatus,
    pub permitted_fields: Vec<String>,
    pub sensitive_field_consents: std::collections::BTreeMap<String, bool>,
    pub output_restrictions: Vec<String>,
    pub delivery_mode: DeliveryMode,
    pub retention_days: u32,
    pub usage_restrictions: String,
    pub deletion_requirements: String,
    pub obligation_hash: Hash32Hex,
}

impl ConsentContract {
    pub fn is_within_window(&self, now: Timestamp) -> bool {
        now >= self.duration_start && now < self.duration_end
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        matches!(self.status, ConsentStatus::Active) && self.is_within_window(now)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObligationType {
    RetentionLimit,
    UsageRestriction,
    DeletionRequirement,
    AccessLimit,
    SharingProhibition,
    PurposeLimitation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnforcementLevel {
    Advisory,
    Monitored,
    Strict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObligationStatus {
    Active,
    Satisfied,
    Violated,
    Expired,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsentObligation {
    pub id: Id,
    pub version: u64,
    pub created_at: Timestamp,

    pub contract_id: Id,
    pub obligation_type: ObligationType,
    pub specification: String,
    pub enforcement_level: EnforcementLevel,
    pub status: ObligationStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    RetentionExceeded,
    UnauthorizedUsage,
    DeletionFailure,
    UnauthorizedSharing,
    PurposeViolation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObligationViolation {
    pub id: Id,
    pub version: u64,
    pub created_at: Timestamp,

    pub contract_id: Id,
    pub obligation_id: Id,
    pub violation_type: ViolationType,
    pub severity: ViolationSeverity,
    pub evidence_hash: Hash32Hex,
    pub penalty_applied: bool,
    pub penalty_amount: u64,
}

/// Context used to drive `detectViolations` (§4.3). A flat struct of
/// observed facts about one obligation-bearing resource; the detector
/// maps each populated flag to its matching `ViolationType`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ViolationContext {
    pub resource_id: String,
    pub actual_retained_days: Option<u32>,
    pub max_retained_days: Option<u32>,
    pub unauthorized_use: bool,
    pub unauthorized_field: Option<String>,
    pub deletion_failed: bool,
    pub shared_with_third_party: bool,
}

/// An obligation specification supplied at contract-creation time.
/// Required for the three mandatory obligation types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObligationSpec {
    pub retention_days: u32,
    pub retention_policy_code: String,
    pub retention_enforcement: EnforcementLevel,
    pub usage_restrictions_doc: String,
    pub usage_enforcement: EnforcementLevel,
    pub deletion_requirements_doc: String,
    pub deletion_enforcement: EnforcementLevel,
}
