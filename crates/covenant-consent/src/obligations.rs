//! Obligation engine (§4.3): derives RETENTION_LIMIT / USAGE_RESTRICTION /
//! DELETION_REQUIREMENT obligations from a spec, detects violations from
//! an observed context, and enforces penalties idempotently.

use std::collections::BTreeMap;
use std::sync::Arc;

use covenant_core::consent::{
    EnforcementLevel, ObligationSpec, ObligationStatus, ObligationType, ConsentObligation,
    ObligationViolation, ViolationContext, ViolationSeverity, ViolationType,
};
use covenant_core::ids::{now, Id};
use covenant_core::ledger::ActorType;
use covenant_crypto::sha256_hex;
use covenant_ledger::AuditChain;
use covenant_state::StateDb;
use tracing::info;

use crate::error::ConsentError;

pub type FieldMap = BTreeMap<String, String>;

/// Returns exactly the permitted keys present in `record`, dropping
/// unknown keys and never synthesising absent ones.
pub fn project_fields(record: &FieldMap, permitted: &[String]) -> FieldMap {
    record
        .iter()
        .filter(|(k, _)| permitted.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn canonical_spec(spec: &ObligationSpec) -> String {
    format!(
        "{}|{}|{:?}|{}|{:?}|{}|{:?}",
        spec.retention_days,
        spec.retention_policy_code,
        spec.retention_enforcement,
        spec.usage_restrictions_doc,
        spec.usage_enforcement,
        spec.deletion_requirements_doc,
        spec.deletion_enforcement,
    )
}

fn severity_for(level: EnforcementLevel) -> ViolationSeverity {
    match level {
        EnforcementLevel::Advisory => ViolationSeverity::Low,
        EnforcementLevel::Monitored => ViolationSeverity::Medium,
        EnforcementLevel::Strict => ViolationSeverity::High,
    }
}

pub struct ObligationEngine {
    db: Arc<StateDb>,
    ledger: Arc<AuditChain>,
}

impl ObligationEngine {
    pub fn new(db: Arc<StateDb>, ledger: Arc<AuditChain>) -> Self {
        Self { db, ledger }
    }

    pub fn create_obligations(
        &self,
        contract_id: Id,
        spec: ObligationSpec,
    ) -> Result<(Vec<Id>, String, Id), ConsentError> {
        if spec.retention_days == 0 {
            return Err(ConsentError::InvalidObligationSpec(
                "retention_days must be positive".to_string(),
            ));
        }
        if spec.retention_policy_code.is_empty()
            || spec.usage_restrictions_doc.is_empty()
            || spec.deletion_requirements_doc.is_empty()
        {
            return Err(ConsentError::InvalidObligationSpec(
                "retention policy code, usage restrictions, and deletion requirements are all required"
                    .to_string(),
            ));
        }

        let obligation_hash = sha256_hex(canonical_spec(&spec).as_bytes());

        let specs = [
            (ObligationType::RetentionLimit, spec.retention_policy_code.clone(), spec.retention_enforcement),
            (ObligationType::UsageRestriction, spec.usage_restrictions_doc.clone(), spec.usage_enforcement),
            (ObligationType::DeletionRequirement, spec.deletion_requirements_doc.clone(), spec.deletion_enforcement),
        ];

        let mut obligation_ids = Vec::with_capacity(3);
        for (obligation_type, specification, enforcement_level) in specs {
            let obligation = ConsentObligation {
                id: Id::new(),
                version: 0,
                created_at: now(),
                contract_id,
                obligation_type,
                specification,
                enforcement_level,
                status: ObligationStatus::Active,
            };
            self.db.put_obligation(&obligation)?;
            obligation_ids.push(obligation.id);
        }

        if let Some(mut contract) = self.db.get_consent_contract(&contract_id)? {
            contract.retention_days = spec.retention_days;
            contract.usage_restrictions = spec.usage_restrictions_doc.clone();
            contract.deletion_requirements = spec.deletion_requirements_doc.clone();
            contract.obligation_hash = obligation_hash.clone();
            contract.version += 1;
            self.db.put_consent_contract(&contract)?;
        }

        let receipt = self.ledger.append_receipt(
            "consent.obligations_created",
            "ConsentContract",
            contract_id,
            Id::nil(),
            ActorType::System,
            &obligation_hash,
        )?;

        info!(contract_id = %contract_id, "obligations created");
        Ok((obligation_ids, obligation_hash, receipt.id))
    }

    /// Maps observed context flags to violation types, one per matching
    /// flag. Severity is derived from the enforcing obligation's level.
    pub fn detect_violations(
        &self,
        contract_id: Id,
        ctx: &ViolationContext,
    ) -> Result<Vec<ObligationViolation>, ConsentError> {
        let obligations = self.db.iter_obligations_for_contract(&contract_id)?;
        let level_for = |t: ObligationType| {
            obligations
                .iter()
                .find(|o| o.obligation_type == t)
                .map(|o| o.enforcement_level)
                .unwrap_or(EnforcementLevel::Advisory)
        };
        let obligation_id_for = |t: ObligationType| {
            obligations
                .iter()
                .find(|o| o.obligation_type == t)
                .map(|o| o.id)
                .unwrap_or(Id::nil())
        };

        let evidence_hash = sha256_hex(format!("{ctx:?}").as_bytes());
        let mut detections: Vec<(ViolationType, ObligationType)> = Vec::new();

        if let (Some(actual), Some(max)) = (ctx.actual_retained_days, ctx.max_retained_days) {
            if actual > max {
                detections.push((ViolationType::RetentionExceeded, ObligationType::RetentionLimit));
            }
        }
        if ctx.unauthorized_use {
            detections.push((ViolationType::UnauthorizedUsage, ObligationType::UsageRestriction));
        }
        if ctx.deletion_failed {
            detections.push((ViolationType::DeletionFailure, ObligationType::DeletionRequirement));
        }
        if ctx.shared_with_third_party {
            detections.push((ViolationType::UnauthorizedSharing, ObligationType::UsageRestriction));
        }
        if ctx.unauthorized_field.is_some() {
            detections.push((ViolationType::PurposeViolation, ObligationType::UsageRestriction));
        }

        let mut violations = Vec::with_capacity(detections.len());
        for (violation_type, obligation_type) in detections {
            let violation = ObligationViolation {
                id: Id::new(),
                version: 0,
                created_at: now(),
                contract_id,
                obligation_id: obligation_id_for(obligation_type),
                violation_type,
                severity: severity_for(level_for(obligation_type)),
                evidence_hash: evidence_hash.clone(),
                penalty_applied: false,
                penalty_amount: 0,
            };
            self.db.put_violation(&violation)?;
            self.ledger.append_receipt(
                "consent.violation_detected",
                "ConsentContract",
                contract_id,
                Id::nil(),
                ActorType::System,
                &evidence_hash,
            )?;
            violations.push(violation);
        }

        info!(contract_id = %contract_id, count = violations.len(), "violations detected");
        Ok(violations)
    }

    /// Idempotent per `violationId`: a second application fails with
    /// `PenaltyAlreadyApplied`.
    pub fn enforce_penalty(&self, violation_id: Id, amount: u64) -> Result<ObligationViolation, ConsentError> {
        let mut violation = self
            .db
            .get_violation(&violation_id)?
            .ok_or(ConsentError::ViolationNotFound(violation_id))?;

        if violation.penalty_applied {
            return Err(ConsentError::PenaltyAlreadyApplied(violation_id));
        }

        violation.penalty_applied = true;
        violation.penalty_amount = amount;
        violation.version += 1;
        self.db.put_violation(&violation)?;

        self.ledger.append_receipt(
            "consent.penalty_enforced",
            "ObligationViolation",
            violation_id,
            Id::nil(),
            ActorType::System,
            &sha256_hex(format!("{amount}").as_bytes()),
        )?;
        info!(violation_id = %violation_id, amount, "penalty enforced");
        Ok(violation)
    }

    pub fn validate_contract_obligations(&self, contract_id: Id) -> Result<bool, ConsentError> {
        let obligations = self.db.iter_obligations_for_contract(&contract_id)?;
        let has_all_three = [
            ObligationType::RetentionLimit,
            ObligationType::UsageRestriction,
            ObligationType::DeletionRequirement,
        ]
        .iter()
        .all(|t| obligations.iter().any(|o| o.obligation_type == *t));
        let none_violated = obligations.iter().all(|o| o.status != ObligationStatus::Violated);
        Ok(has_all_three && none_violated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::consent::ConsentStatus;
    use covenant_events::EventBus;

    fn setup(name: &str) -> (ObligationEngine, Arc<StateDb>, Id) {
        let dir = std::env::temp_dir().join(format!("covenant_obligations_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).unwrap());
        let events = Arc::new(EventBus::new(db.clone(), 5));
        let ledger = Arc::new(AuditChain::new(db.clone(), events));

        let contract_id = Id::new();
        let contract = covenant_core::consent::ConsentContract {
            id: contract_id,
            version: 0,
            created_at: 0,
            ds_id: Id::new(),
            requester_id: Id::new(),
            request_id: Id::new(),
            scope_hash: "a".repeat(64),
            purpose_hash: "b".repeat(64),
            duration_start: 0,
            duration_end: 1_000_000,
            compensation_amount: 0,
            status: ConsentStatus::Active,
            permitted_fields: vec!["domain.age".to_string()],
            sensitive_field_consents: Default::default(),
            output_restrictions: Vec::new(),
            delivery_mode: covenant_core::consent::DeliveryMode::CleanRoom,
            retention_days: 0,
            usage_restrictions: String::new(),
            deletion_requirements: String::new(),
            obligation_hash: String::new(),
        };
        db.put_consent_contract(&contract).unwrap();
        (ObligationEngine::new(db.clone(), ledger), db, contract_id)
    }

    fn sample_spec() -> ObligationSpec {
        ObligationSpec {
            retention_days: 30,
            retention_policy_code: "RP-1".to_string(),
            retention_enforcement: EnforcementLevel::Strict,
            usage_restrictions_doc: "research only".to_string(),
            usage_enforcement: EnforcementLevel::Monitored,
            deletion_requirements_doc: "delete after retention".to_string(),
            deletion_enforcement: EnforcementLevel::Strict,
        }
    }

    #[test]
    fn creates_one_obligation_per_required_type() {
        let (engine, _db, contract_id) = setup("create");
        let (ids, hash, _receipt_id) = engine.create_obligations(contract_id, sample_spec()).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(hash.len(), 64);
        assert!(engine.validate_contract_obligations(contract_id).unwrap());
    }

    #[test]
    fn zero_retention_days_rejected() {
        let (engine, _db, contract_id) = setup("zero");
        let mut spec = sample_spec();
        spec.retention_days = 0;
        assert!(matches!(
            engine.create_obligations(contract_id, spec),
            Err(ConsentError::InvalidObligationSpec(_))
        ));
    }

    #[test]
    fn detects_retention_and_sharing_violations() {
        let (engine, _db, contract_id) = setup("violate");
        engine.create_obligations(contract_id, sample_spec()).unwrap();
        let ctx = ViolationContext {
            resource_id: "r1".to_string(),
            actual_retained_days: Some(60),
            max_retained_days: Some(30),
            unauthorized_use: false,
            unauthorized_field: None,
            deletion_failed: false,
            shared_with_third_party: true,
        };
        let violations = engine.detect_violations(contract_id, &ctx).unwrap();
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.violation_type == ViolationType::RetentionExceeded));
        assert!(violations.iter().any(|v| v.violation_type == ViolationType::UnauthorizedSharing));
    }

    #[test]
    fn penalty_enforcement_is_idempotent() {
        let (engine, _db, contract_id) = setup("penalty");
        engine.create_obligations(contract_id, sample_spec()).unwrap();
        let ctx = ViolationContext {
            resource_id: "r1".to_string(),
            unauthorized_use: true,
            ..Default::default()
        };
        let violations = engine.detect_violations(contract_id, &ctx).unwrap();
        let violation_id = violations[0].id;
        engine.enforce_penalty(violation_id, 50).unwrap();
        assert!(matches!(
            engine.enforce_penalty(violation_id, 50),
            Err(ConsentError::PenaltyAlreadyApplied(_))
        ));
    }

    #[test]
    fn project_fields_drops_unknown_and_never_synthesises() {
        let mut record = FieldMap::new();
        record.insert("domain.age".to_string(), "30".to_string());
        record.insert("name".to_string(), "alice".to_string());
        let permitted = vec!["domain.age".to_string(), "missing.field".to_string()];
        let projected = project_fields(&record, &permitted);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get("domain.age"), Some(&"30".to_string()));
    }
}
