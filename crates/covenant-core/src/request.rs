//! Request and screening types — §3 `Request`, `ScreeningResult`, `PolicyRule`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{Id, Timestamp};

/// A label→value mapping for scope or eligibility criteria. `BTreeMap` is
/// used (rather than `HashMap`) so canonical serialisation is
/// deterministic by construction — no separate sort step needed wherever
/// a scope/criteria map feeds a hash or a signature payload.
pub type LabelMap = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitType {
    Survey,
    DataAccess,
    Participation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Draft,
    Screening,
    Active,
    Completed,
    Cancelled,
    Rejected,
}

/// A compensated-access request submitted by a requester.
///
/// Owned by `requesterId`; mutable only through the explicit lifecycle
/// transitions the screening and orchestration engines drive — never by
/// direct field assignment from outside this workspace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    pub id: Id,
    pub version: u64,
    pub created_at: Timestamp,

    pub requester_id: Id,
    pub purpose: String,
    pub scope: LabelMap,
    pub eligibility_criteria: LabelMap,
    pub duration_start: Timestamp,
    pub duration_end: Timestamp,
    pub unit_type: UnitType,
    pub unit_price: u64,
    pub max_participants: u64,
    pub budget: u64,
    pub escrow_id: Option<Id>,
    pub status: RequestStatus,
}

impl Request {
    /// Budget must cover `unitPrice × maxParticipants` (§3 invariant).
    pub fn budget_covers_participants(&self) -> bool {
        self.budget >= self.unit_price.saturating_mul(self.max_participants)
    }

    pub fn duration_days(&self) -> i64 {
        (self.duration_end - self.duration_start) / 86_400
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreeningDecision {
    Approved,
    Rejected,
    ManualReview,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenedBy {
    Automated,
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppealStatus {
    None,
    Pending,
    Approved,
    Rejected,
}

/// The 1:1 screening outcome for a `Request`.
///
/// Invariant: `decision == Rejected` iff `reason_codes` contains at least
/// one code from a BLOCKING rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub id: Id,
    pub version: u64,
    pub created_at: Timestamp,

    pub request_id: Id,
    pub decision: ScreeningDecision,
    pub reason_codes: Vec<String>,
    pub risk_score: f64,
    pub cohort_size_estimate: u64,
    pub policy_version: String,
    pub screened_by: ScreenedBy,
    pub appeal_status: AppealStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleType {
    Blocking,
    Warning,
    Info,
}

/// Rules are data, not code (§4.1). Seeded once at bootstrap, evaluated
/// generically by the screening engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyRule {
    pub rule_code: String,
    pub rule_type: RuleType,
    pub category: String,
    pub severity: u8,
    pub is_active: bool,
}
