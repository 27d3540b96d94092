//! Runs the three Privacy Governor gates in order (§4.4): k-anonymity,
//! linkage rate limit, Privacy Risk Budget. A failure at any stage yields
//! DENY with reason codes and halts dispatch; every decision is recorded
//! as a `PolicyDecisionReceipt`.

use std::sync::Arc;

use covenant_core::governor::{GateDecision, PolicyDecisionReceipt};
use covenant_core::ids::{now, Id};
use covenant_crypto::sha256_hex;
use covenant_state::StateDb;

use crate::error::GovernorError;
use crate::kanon::KAnonymityGate;
use crate::linkage::LinkageGate;
use crate::prb::PrbGate;

pub struct PrivacyGovernor {
    db: Arc<StateDb>,
    kanon: KAnonymityGate,
    linkage: LinkageGate,
    prb: PrbGate,
}

pub struct GovernorCheckRequest<'a> {
    pub requester_id: Id,
    pub ds_id: Id,
    pub criteria_canonical: &'a str,
    pub query_hash: &'a str,
    pub criteria_tokens: &'a [String],
    pub prb_cost: f64,
}

pub struct GovernorDecision {
    pub decision: GateDecision,
    pub reason_codes: Vec<String>,
}

impl PrivacyGovernor {
    pub fn new(db: Arc<StateDb>, kanon: KAnonymityGate, linkage: LinkageGate, prb: PrbGate) -> Self {
        Self { db, kanon, linkage, prb }
    }

    /// Runs every gate in order; returns on the first DENY without
    /// consuming later gates' resources.
    pub fn check(
        &self,
        req: GovernorCheckRequest,
        cohort_estimate: impl Fn() -> u64,
    ) -> Result<GovernorDecision, GovernorError> {
        let kanon_result = self.kanon.check(req.criteria_canonical, cohort_estimate)?;
        if !kanon_result.allowed {
            return self.record("k_anonymity", GateDecision::Deny, kanon_result.reason_codes);
        }

        let linkage_result = self.linkage.check(req.requester_id, req.query_hash, req.criteria_tokens)?;
        if !linkage_result.allowed {
            return self.record("linkage_rate_limit", GateDecision::Deny, linkage_result.reason_codes);
        }

        let prb_result = self.prb.check_and_consume(req.ds_id, req.prb_cost)?;
        if !prb_result.allowed {
            return self.record("privacy_risk_budget", GateDecision::Deny, prb_result.reason_codes);
        }

        self.record("all_gates", GateDecision::Allow, Vec::new())
    }

    fn record(
        &self,
        gate_type: &str,
        decision: GateDecision,
        reason_codes: Vec<String>,
    ) -> Result<GovernorDecision, GovernorError> {
        let receipt = PolicyDecisionReceipt {
            id: Id::new(),
            created_at: now(),
            gate_type: gate_type.to_string(),
            decision,
            reasons: reason_codes.clone(),
            policy_version: "1.0".to_string(),
            details_hash: sha256_hex(format!("{gate_type}|{reason_codes:?}").as_bytes()),
        };
        self.db.put_policy_decision_receipt(&receipt)?;
        Ok(GovernorDecision {
            decision,
            reason_codes,
        })
    }
}
