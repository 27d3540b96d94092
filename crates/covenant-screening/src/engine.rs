//! Screening engine (§4.1): evaluates a request against the active rule
//! base, set as data rather than hard-coded branches, mirroring the
//! teacher's pure-function vertex validation over a loaded rule set.

use std::sync::Arc;

use covenant_core::ids::{now, Id};
use covenant_core::ledger::ActorType;
use covenant_core::request::{
    AppealStatus, Request, RequestStatus, RuleType, ScreenedBy, ScreeningDecision, ScreeningResult,
};
use covenant_ledger::AuditChain;
use covenant_state::StateDb;
use tracing::info;

use crate::error::ScreeningError;
use crate::rules::{BUDGET_ESCROW_MATCH, COHORT_MIN_SIZE, DURATION_REASONABLE, REIDENTIFICATION_RISK, SCOPE_SENSITIVE};

const DIRECT_IDENTIFIERS: &[&str] = &["name", "email", "phone", "ssn", "nationalid"];
const QUASI_IDENTIFIERS: &[&str] = &["birthdate", "zipcode", "gender", "occupation", "employer", "address"];
const SENSITIVE_CATEGORIES: &[&str] = &[
    "health", "medical", "financial", "political", "religious", "sexual", "biometric", "genetic", "criminal",
];

/// Conservative cohort-size estimate: with no criteria, treat the cohort
/// as arbitrarily large; otherwise each added criterion roughly halves
/// it, floored at 1.
pub fn estimate_cohort_size(request: &Request) -> u64 {
    let n = request.eligibility_criteria.len() as u32;
    if n == 0 {
        return u64::MAX;
    }
    let exponent = 10u32.saturating_sub(n);
    (1u64 << exponent).max(1)
}

struct RuleViolation {
    rule_code: String,
    rule_type: RuleType,
    severity: u8,
}

fn evaluate_rules(request: &Request, cohort_estimate: u64) -> Vec<RuleViolation> {
    let mut violations = Vec::new();

    if cohort_estimate < covenant_core::constants::DEFAULT_MIN_COHORT_SIZE {
        violations.push(RuleViolation {
            rule_code: COHORT_MIN_SIZE.to_string(),
            rule_type: RuleType::Blocking,
            severity: 10,
        });
    }

    if !request.budget_covers_participants() {
        violations.push(RuleViolation {
            rule_code: BUDGET_ESCROW_MATCH.to_string(),
            rule_type: RuleType::Blocking,
            severity: 10,
        });
    }

    if request.duration_days() > covenant_core::constants::MAX_REASONABLE_DURATION_DAYS {
        violations.push(RuleViolation {
            rule_code: DURATION_REASONABLE.to_string(),
            rule_type: RuleType::Warning,
            severity: 3,
        });
    }

    let scope_values: Vec<String> = request.scope.values().map(|v| v.to_lowercase()).collect();
    let scope_keys: Vec<String> = request.scope.keys().map(|k| k.to_lowercase()).collect();
    let all_scope_tokens: Vec<&String> = scope_keys.iter().chain(scope_values.iter()).collect();

    let has_direct_identifier = all_scope_tokens
        .iter()
        .any(|t| DIRECT_IDENTIFIERS.contains(&t.as_str()));
    let quasi_count = all_scope_tokens
        .iter()
        .filter(|t| QUASI_IDENTIFIERS.contains(&t.as_str()))
        .count();
    if has_direct_identifier || quasi_count >= 3 {
        violations.push(RuleViolation {
            rule_code: REIDENTIFICATION_RISK.to_string(),
            rule_type: RuleType::Blocking,
            severity: 9,
        });
    }

    if all_scope_tokens
        .iter()
        .any(|t| SENSITIVE_CATEGORIES.contains(&t.as_str()))
    {
        violations.push(RuleViolation {
            rule_code: SCOPE_SENSITIVE.to_string(),
            rule_type: RuleType::Warning,
            severity: 5,
        });
    }

    violations.sort_by(|a, b| b.severity.cmp(&a.severity));
    violations
}

pub struct ScreeningEngine {
    db: Arc<StateDb>,
    ledger: Arc<AuditChain>,
    manual_review_threshold: f64,
}

impl ScreeningEngine {
    pub fn new(db: Arc<StateDb>, ledger: Arc<AuditChain>, manual_review_threshold: f64) -> Self {
        Self {
            db,
            ledger,
            manual_review_threshold,
        }
    }

    pub fn screen(&self, request_id: Id) -> Result<ScreeningResult, ScreeningError> {
        let mut request = self
            .db
            .get_request(&request_id)?
            .ok_or(ScreeningError::RequestNotFound(request_id))?;

        if !matches!(request.status, RequestStatus::Screening) {
            return Err(ScreeningError::InvalidScreeningState(request_id));
        }
        if self.existing_result_for(request_id)?.is_some() {
            return Err(ScreeningError::AlreadyScreened(request_id));
        }

        let cohort_estimate = estimate_cohort_size(&request);
        let violations = evaluate_rules(&request, cohort_estimate);

        let mut risk_score = 0.0f64;
        let mut reason_codes = Vec::new();
        let mut blocking = false;
        for v in &violations {
            risk_score = (risk_score + v.severity as f64 / 10.0).min(1.0);
            reason_codes.push(v.rule_code.clone());
            if matches!(v.rule_type, RuleType::Blocking) {
                blocking = true;
            }
        }

        let decision = if blocking {
            ScreeningDecision::Rejected
        } else if risk_score >= self.manual_review_threshold {
            ScreeningDecision::ManualReview
        } else {
            ScreeningDecision::Approved
        };

        let result = ScreeningResult {
            id: Id::new(),
            version: 0,
            created_at: now(),
            request_id,
            decision,
            reason_codes,
            risk_score,
            cohort_size_estimate: cohort_estimate.min(u64::from(u32::MAX)),
            policy_version: "1.0".to_string(),
            screened_by: ScreenedBy::Automated,
            appeal_status: AppealStatus::None,
        };
        self.db.put_screening_result(&result)?;

        request.status = match decision {
            ScreeningDecision::Rejected => RequestStatus::Rejected,
            _ => RequestStatus::Active,
        };
        self.db.put_request(&request)?;

        self.ledger.append_receipt(
            "screening.decided",
            "Request",
            request_id,
            Id::nil(),
            ActorType::System,
            &covenant_crypto::sha256_hex(format!("{decision:?}|{}", result.risk_score).as_bytes()),
        )?;

        info!(request_id = %request_id, decision = ?decision, "request screened");
        Ok(result)
    }

    /// A REJECTED decision may be appealed once; approval re-activates
    /// the request, rejection confirms the terminal state.
    pub fn resolve_appeal(&self, screening_result_id: Id, approve: bool) -> Result<ScreeningResult, ScreeningError> {
        let mut result = self
            .db
            .get_screening_result(&screening_result_id)?
            .ok_or(ScreeningError::ScreeningResultNotFound(screening_result_id))?;

        if !matches!(result.appeal_status, AppealStatus::None | AppealStatus::Pending) {
            return Err(ScreeningError::AppealAlreadyResolved(screening_result_id));
        }

        if approve {
            result.appeal_status = AppealStatus::Approved;
            result.decision = ScreeningDecision::Approved;
            let mut request = self
                .db
                .get_request(&result.request_id)?
                .ok_or(ScreeningError::RequestNotFound(result.request_id))?;
            request.status = RequestStatus::Active;
            self.db.put_request(&request)?;
        } else {
            result.appeal_status = AppealStatus::Rejected;
        }
        result.version += 1;
        self.db.put_screening_result(&result)?;

        self.ledger.append_receipt(
            "screening.appeal_resolved",
            "ScreeningResult",
            screening_result_id,
            Id::nil(),
            ActorType::System,
            &covenant_crypto::sha256_hex(format!("{approve}").as_bytes()),
        )?;

        Ok(result)
    }

    fn existing_result_for(&self, request_id: Id) -> Result<Option<ScreeningResult>, ScreeningError> {
        // ScreeningResult is 1:1 with Request; the state layer has no
        // secondary index so this scans. Acceptable at the embedded-store
        // scale this platform targets; an ODX-backed production store
        // would add a request_id index.
        Ok(self
            .db
            .iter_screening_results()?
            .into_iter()
            .find(|r| r.request_id == request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::request::{LabelMap, UnitType};
    use covenant_events::EventBus;

    fn setup(name: &str) -> (ScreeningEngine, Arc<StateDb>) {
        let dir = std::env::temp_dir().join(format!("covenant_screening_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).unwrap());
        let events = Arc::new(EventBus::new(db.clone(), 5));
        let ledger = Arc::new(AuditChain::new(db.clone(), events));
        (ScreeningEngine::new(db.clone(), ledger, 0.5), db)
    }

    fn base_request() -> Request {
        Request {
            id: Id::new(),
            version: 0,
            created_at: 0,
            requester_id: Id::new(),
            purpose: "research".to_string(),
            scope: LabelMap::new(),
            eligibility_criteria: LabelMap::new(),
            duration_start: 0,
            duration_end: 86_400 * 30,
            unit_type: UnitType::Survey,
            unit_price: 10,
            max_participants: 100,
            budget: 1_000,
            escrow_id: None,
            status: RequestStatus::Screening,
        }
    }

    #[test]
    fn large_cohort_sufficient_budget_approves() {
        let (engine, db) = setup("approve");
        let request = base_request();
        db.put_request(&request).unwrap();
        let result = engine.screen(request.id).unwrap();
        assert_eq!(result.decision, ScreeningDecision::Approved);
    }

    #[test]
    fn insufficient_budget_rejects() {
        let (engine, db) = setup("budget");
        let mut request = base_request();
        request.budget = 1;
        db.put_request(&request).unwrap();
        let result = engine.screen(request.id).unwrap();
        assert_eq!(result.decision, ScreeningDecision::Rejected);
        assert!(result.reason_codes.contains(&BUDGET_ESCROW_MATCH.to_string()));
    }

    #[test]
    fn direct_identifier_in_scope_rejects() {
        let (engine, db) = setup("reident");
        let mut request = base_request();
        request.scope.insert("contact".to_string(), "email".to_string());
        db.put_request(&request).unwrap();
        let result = engine.screen(request.id).unwrap();
        assert_eq!(result.decision, ScreeningDecision::Rejected);
        assert!(result.reason_codes.contains(&REIDENTIFICATION_RISK.to_string()));
    }

    #[test]
    fn re_screening_already_screened_request_errors() {
        let (engine, db) = setup("dup");
        let request = base_request();
        db.put_request(&request).unwrap();
        engine.screen(request.id).unwrap();
        // second call sees status already flipped away from SCREENING
        assert!(matches!(
            engine.screen(request.id),
            Err(ScreeningError::InvalidScreeningState(_))
        ));
    }

    #[test]
    fn cohort_estimate_halves_per_criterion() {
        let mut request = base_request();
        assert_eq!(estimate_cohort_size(&request), u64::MAX);
        request.eligibility_criteria.insert("domain.age".to_string(), "adult".to_string());
        assert_eq!(estimate_cohort_size(&request), 512);
    }
}
