//! Query plan creation, signing, and dispatch (§4.4 first half).

use std::sync::Arc;

use covenant_core::consent::ConsentStatus;
use covenant_core::ids::{now, Id, Timestamp};
use covenant_core::query::{PlanStatus, QueryPlan};
use covenant_state::StateDb;
use tracing::info;

use crate::error::OrchestratorError;
use crate::keystore::KeyStore;

pub struct CreatePlanRequest {
    pub requester_id: Id,
    pub contract_id: Id,
    pub scope_hash: String,
    pub transforms: Vec<String>,
    pub ttl_minutes: i64,
}

pub struct PlanOrchestrator {
    db: Arc<StateDb>,
    keystore: Arc<KeyStore>,
    signing_key_id: String,
}

pub struct DispatchRecord {
    pub device_id: Id,
    pub timeout_seconds: i64,
    pub dispatched_at: Timestamp,
}

pub struct DispatchResult {
    pub plan_id: Id,
    pub records: Vec<DispatchRecord>,
}

impl PlanOrchestrator {
    pub fn new(db: Arc<StateDb>, keystore: Arc<KeyStore>, signing_key_id: impl Into<String>) -> Self {
        Self {
            db,
            keystore,
            signing_key_id: signing_key_id.into(),
        }
    }

    pub fn create_query_plan(&self, req: CreatePlanRequest) -> Result<QueryPlan, OrchestratorError> {
        let contract = self
            .db
            .get_consent_contract(&req.contract_id)?
            .ok_or(OrchestratorError::ContractNotUsable(req.contract_id))?;

        let now_ts = now();
        if !matches!(contract.status, ConsentStatus::Active) || !contract.is_within_window(now_ts) {
            return Err(OrchestratorError::ContractNotUsable(req.contract_id));
        }
        if !req.transforms.iter().all(|t| contract.output_restrictions.contains(t)) {
            return Err(OrchestratorError::TransformNotAllowed);
        }

        let mut plan = QueryPlan {
            id: Id::new(),
            version: 0,
            created_at: now_ts,
            request_id: contract.request_id,
            contract_id: req.contract_id,
            scope_hash: req.scope_hash,
            allowed_transforms: req.transforms,
            output_restrictions: contract.output_restrictions.clone(),
            permitted_fields: contract.permitted_fields.clone(),
            compensation: contract.compensation_amount,
            ttl: now_ts + req.ttl_minutes * 60,
            signature: Vec::new(),
            signed_at: 0,
            signing_key_id: self.signing_key_id.clone(),
            status: PlanStatus::Pending,
        };

        let payload = plan.signable_payload();
        plan.signature = self.keystore.sign_with(&self.signing_key_id, payload.as_bytes())?;
        plan.signed_at = now();

        self.db.put_query_plan(&plan)?;
        info!(plan_id = %plan.id, "query plan created and signed");
        Ok(plan)
    }

    /// Verification is mandatory before dispatch and before any device
    /// acts on the plan.
    pub fn verify_plan(&self, plan: &QueryPlan) -> Result<(), OrchestratorError> {
        let public_key = self.keystore.public_key_bytes(&plan.signing_key_id)?;
        covenant_crypto::verify(&public_key, plan.signable_payload().as_bytes(), &plan.signature)
            .map_err(|_| OrchestratorError::PlanSignatureInvalid(plan.id))
    }

    pub fn dispatch(
        &self,
        plan_id: Id,
        eligible_device_ids: &[Id],
        timeout_seconds: i64,
    ) -> Result<DispatchResult, OrchestratorError> {
        let mut plan = self
            .db
            .get_query_plan(&plan_id)?
            .ok_or(OrchestratorError::PlanNotFound(plan_id))?;

        if plan.is_expired(now()) {
            return Err(OrchestratorError::PlanExpired(plan_id));
        }
        self.verify_plan(&plan)?;

        let dispatched_at = now();
        let records: Vec<DispatchRecord> = eligible_device_ids
            .iter()
            .map(|&device_id| DispatchRecord {
                device_id,
                timeout_seconds,
                dispatched_at,
            })
            .collect();

        plan.status = PlanStatus::Dispatched;
        plan.version += 1;
        self.db.put_query_plan(&plan)?;

        info!(plan_id = %plan_id, device_count = records.len(), "plan dispatched");
        Ok(DispatchResult { plan_id, records })
    }
}

/// A device's response re-validates the plan signature and TTL before a
/// Time Capsule may be produced from it.
pub fn revalidate_for_response(
    keystore: &KeyStore,
    plan: &QueryPlan,
    now_ts: Timestamp,
) -> Result<(), OrchestratorError> {
    let public_key = keystore.public_key_bytes(&plan.signing_key_id)?;
    covenant_crypto::verify(&public_key, plan.signable_payload().as_bytes(), &plan.signature)
        .map_err(|_| OrchestratorError::PlanSignatureInvalid(plan.id))?;
    if plan.is_expired(now_ts) {
        return Err(OrchestratorError::PlanExpired(plan.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::consent::{ConsentContract, DeliveryMode};

    fn setup(name: &str) -> (PlanOrchestrator, Arc<StateDb>, Id) {
        let dir = std::env::temp_dir().join(format!("covenant_plan_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).unwrap());
        let keystore = Arc::new(KeyStore::new(db.clone()));
        keystore.register_signing_key("plan-key", covenant_crypto::KeyPair::generate());

        let contract_id = Id::new();
        let contract = ConsentContract {
            id: contract_id,
            version: 0,
            created_at: 0,
            ds_id: Id::new(),
            requester_id: Id::new(),
            request_id: Id::new(),
            scope_hash: "a".repeat(64),
            purpose_hash: "b".repeat(64),
            duration_start: 0,
            duration_end: now() + 1_000_000,
            compensation_amount: 50,
            status: ConsentStatus::Active,
            permitted_fields: vec!["domain.age".to_string()],
            sensitive_field_consents: Default::default(),
            output_restrictions: vec!["aggregate".to_string()],
            delivery_mode: DeliveryMode::CleanRoom,
            retention_days: 30,
            usage_restrictions: "research".to_string(),
            deletion_requirements: "delete after".to_string(),
            obligation_hash: "c".repeat(64),
        };
        db.put_consent_contract(&contract).unwrap();
        (PlanOrchestrator::new(db.clone(), keystore, "plan-key"), db, contract_id)
    }

    #[test]
    fn create_plan_produces_valid_signature() {
        let (orchestrator, _db, contract_id) = setup("create");
        let plan = orchestrator
            .create_query_plan(CreatePlanRequest {
                requester_id: Id::new(),
                contract_id,
                scope_hash: "scope".to_string(),
                transforms: vec!["aggregate".to_string()],
                ttl_minutes: 60,
            })
            .unwrap();
        assert!(orchestrator.verify_plan(&plan).is_ok());
    }

    #[test]
    fn disallowed_transform_rejected() {
        let (orchestrator, _db, contract_id) = setup("transform");
        let result = orchestrator.create_query_plan(CreatePlanRequest {
            requester_id: Id::new(),
            contract_id,
            scope_hash: "scope".to_string(),
            transforms: vec!["raw_export".to_string()],
            ttl_minutes: 60,
        });
        assert!(matches!(result, Err(OrchestratorError::TransformNotAllowed)));
    }

    #[test]
    fn dispatch_fails_for_expired_plan() {
        let (orchestrator, db, contract_id) = setup("expired");
        let mut plan = orchestrator
            .create_query_plan(CreatePlanRequest {
                requester_id: Id::new(),
                contract_id,
                scope_hash: "scope".to_string(),
                transforms: vec!["aggregate".to_string()],
                ttl_minutes: 60,
            })
            .unwrap();
        plan.ttl = now() - 10;
        db.put_query_plan(&plan).unwrap();
        let result = orchestrator.dispatch(plan.id, &[Id::new()], 30);
        assert!(matches!(result, Err(OrchestratorError::PlanExpired(_))));
    }
}
