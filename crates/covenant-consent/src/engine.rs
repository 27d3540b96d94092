//! Consent contract lifecycle (§4.3): creation, revocation, and access
//! evaluation. Validate preconditions against loaded state, stage the
//! mutation, commit, append a receipt.

use std::sync::Arc;

use covenant_core::consent::{ConsentContract, ConsentStatus, DeliveryMode};
use covenant_core::ids::{now, Id, Hash32Hex, Timestamp};
use covenant_core::ledger::ActorType;
use covenant_core::query::PlanStatus;
use covenant_ledger::AuditChain;
use covenant_state::StateDb;
use tracing::info;

use crate::error::ConsentError;

pub struct ConsentRequest {
    pub ds_id: Id,
    pub requester_id: Id,
    pub request_id: Id,
    pub scope_hash: Hash32Hex,
    pub purpose_hash: Hash32Hex,
    pub duration_start: Timestamp,
    pub duration_end: Timestamp,
    pub compensation_amount: u64,
    pub permitted_fields: Vec<String>,
    pub sensitive_field_consents: std::collections::BTreeMap<String, bool>,
    pub output_restrictions: Vec<String>,
    pub delivery_mode: DeliveryMode,
}

pub struct ConsentEngine {
    db: Arc<StateDb>,
    ledger: Arc<AuditChain>,
}

impl ConsentEngine {
    pub fn new(db: Arc<StateDb>, ledger: Arc<AuditChain>) -> Self {
        Self { db, ledger }
    }

    pub fn create_consent(&self, req: ConsentRequest) -> Result<ConsentContract, ConsentError> {
        if req.duration_end <= req.duration_start
            || req.scope_hash.is_empty()
            || req.purpose_hash.is_empty()
        {
            return Err(ConsentError::InvalidConsentRequest);
        }

        let duplicate = self
            .db
            .iter_consent_contracts()?
            .into_iter()
            .any(|c| {
                c.ds_id == req.ds_id
                    && c.request_id == req.request_id
                    && !matches!(c.status, ConsentStatus::Revoked)
            });
        if duplicate {
            return Err(ConsentError::DuplicateConsent);
        }

        let contract = ConsentContract {
            id: Id::new(),
            version: 0,
            created_at: now(),
            ds_id: req.ds_id,
            requester_id: req.requester_id,
            request_id: req.request_id,
            scope_hash: req.scope_hash,
            purpose_hash: req.purpose_hash,
            duration_start: req.duration_start,
            duration_end: req.duration_end,
            compensation_amount: req.compensation_amount,
            status: ConsentStatus::Active,
            permitted_fields: req.permitted_fields,
            sensitive_field_consents: req.sensitive_field_consents,
            output_restrictions: req.output_restrictions,
            delivery_mode: req.delivery_mode,
            retention_days: 0,
            usage_restrictions: String::new(),
            deletion_requirements: String::new(),
            obligation_hash: String::new(),
        };
        self.db.put_consent_contract(&contract)?;

        self.ledger.append_receipt(
            "consent.created",
            "ConsentContract",
            contract.id,
            contract.ds_id,
            ActorType::Ds,
            &covenant_crypto::sha256_hex(
                format!("{}|{}", contract.scope_hash, contract.purpose_hash).as_bytes(),
            ),
        )?;
        info!(contract_id = %contract.id, "consent contract created");
        Ok(contract)
    }

    /// Revocation is authorised only by the owning DS; terminal. Every
    /// query plan still referencing the contract is marked EXPIRED.
    pub fn revoke_consent(&self, contract_id: Id, ds_id: Id) -> Result<ConsentContract, ConsentError> {
        let mut contract = self
            .db
            .get_consent_contract(&contract_id)?
            .ok_or(ConsentError::ContractNotFound(contract_id))?;

        if contract.ds_id != ds_id {
            return Err(ConsentError::NotOwner(contract_id));
        }
        if matches!(contract.status, ConsentStatus::Revoked) {
            return Err(ConsentError::NotRevocable(contract_id));
        }

        contract.status = ConsentStatus::Revoked;
        contract.version += 1;
        self.db.put_consent_contract(&contract)?;

        for mut plan in self.db.iter_query_plans_for_contract(&contract_id)? {
            if !matches!(plan.status, PlanStatus::Expired) {
                plan.status = PlanStatus::Expired;
                plan.version += 1;
                self.db.put_query_plan(&plan)?;
            }
        }

        self.ledger.append_receipt(
            "consent.revoked",
            "ConsentContract",
            contract.id,
            ds_id,
            ActorType::Ds,
            &covenant_crypto::sha256_hex(contract.id.to_string().as_bytes()),
        )?;
        info!(contract_id = %contract.id, "consent contract revoked");
        Ok(contract)
    }

    /// True iff the contract is ACTIVE, `now` falls within its window, and
    /// the requested-fields hash matches the contract's scope hash (or a
    /// subset hash derived from `permittedFields`).
    pub fn evaluate_access(&self, contract_id: Id, requested_fields_hash: &str) -> Result<bool, ConsentError> {
        let contract = self
            .db
            .get_consent_contract(&contract_id)?
            .ok_or(ConsentError::ContractNotFound(contract_id))?;

        if !contract.is_active(now()) {
            return Ok(false);
        }

        if requested_fields_hash == contract.scope_hash {
            return Ok(true);
        }
        let subset_hash = covenant_crypto::sha256_hex(contract.permitted_fields.join(",").as_bytes());
        Ok(requested_fields_hash == subset_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_events::EventBus;

    fn setup(name: &str) -> (ConsentEngine, Arc<StateDb>) {
        let dir = std::env::temp_dir().join(format!("covenant_consent_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(StateDb::open(&dir).unwrap());
        let events = Arc::new(EventBus::new(db.clone(), 5));
        let ledger = Arc::new(AuditChain::new(db.clone(), events));
        (ConsentEngine::new(db.clone(), ledger), db)
    }

    fn sample_request() -> ConsentRequest {
        ConsentRequest {
            ds_id: Id::new(),
            requester_id: Id::new(),
            request_id: Id::new(),
            scope_hash: "a".repeat(64),
            purpose_hash: "b".repeat(64),
            duration_start: 0,
            duration_end: 1_000_000_000_000,
            compensation_amount: 100,
            permitted_fields: vec!["domain.age".to_string()],
            sensitive_field_consents: Default::default(),
            output_restrictions: Vec::new(),
            delivery_mode: DeliveryMode::CleanRoom,
        }
    }

    #[test]
    fn create_then_revoke_round_trips() {
        let (engine, _db) = setup("basic");
        let req = sample_request();
        let ds_id = req.ds_id;
        let contract = engine.create_consent(req).unwrap();
        assert_eq!(contract.status, ConsentStatus::Active);

        let revoked = engine.revoke_consent(contract.id, ds_id).unwrap();
        assert_eq!(revoked.status, ConsentStatus::Revoked);
    }

    #[test]
    fn duplicate_active_consent_rejected() {
        let (engine, _db) = setup("dup");
        let req = sample_request();
        engine.create_consent(sample_request_clone(&req)).unwrap();
        assert!(matches!(
            engine.create_consent(req),
            Err(ConsentError::DuplicateConsent)
        ));
    }

    #[test]
    fn revoke_by_non_owner_rejected() {
        let (engine, _db) = setup("owner");
        let contract = engine.create_consent(sample_request()).unwrap();
        assert!(matches!(
            engine.revoke_consent(contract.id, Id::new()),
            Err(ConsentError::NotOwner(_))
        ));
    }

    #[test]
    fn access_denied_after_revocation() {
        let (engine, _db) = setup("access");
        let req = sample_request();
        let ds_id = req.ds_id;
        let scope_hash = req.scope_hash.clone();
        let contract = engine.create_consent(req).unwrap();
        assert!(engine.evaluate_access(contract.id, &scope_hash).unwrap());
        engine.revoke_consent(contract.id, ds_id).unwrap();
        assert!(!engine.evaluate_access(contract.id, &scope_hash).unwrap());
    }

    fn sample_request_clone(req: &ConsentRequest) -> ConsentRequest {
        ConsentRequest {
            ds_id: req.ds_id,
            requester_id: req.requester_id,
            request_id: req.request_id,
            scope_hash: req.scope_hash.clone(),
            purpose_hash: req.purpose_hash.clone(),
            duration_start: req.duration_start,
            duration_end: req.duration_end,
            compensation_amount: req.compensation_amount,
            permitted_fields: req.permitted_fields.clone(),
            sensitive_field_consents: req.sensitive_field_consents.clone(),
            output_restrictions: req.output_restrictions.clone(),
            delivery_mode: req.delivery_mode,
        }
    }
}
