//! Scripted end-to-end scenarios: the same sequences a real deployment
//! runs across its network transport, driven here as direct calls
//! against one wired `Platform` with no transport in between. Used by
//! both the local CLI and the integration tests in `tests/`.

use covenant_consent::ConsentRequest;
use covenant_core::consent::{ConsentStatus, DeliveryMode};
use covenant_core::error::CoreError;
use covenant_core::ids::{now, Id};
use covenant_core::request::{LabelMap, Request, RequestStatus, ScreeningDecision, UnitType};
use covenant_orchestrator::{CreateCapsuleRequest, CreatePlanRequest};
use rand::thread_rng;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::platform::Platform;

/// A request with a wide eligibility net and a budget that comfortably
/// covers its participant cap, which screening approves outright.
pub fn approvable_request(requester_id: Id, budget: u64, max_participants: u64, unit_price: u64) -> Request {
    Request {
        id: Id::new(),
        version: 0,
        created_at: now(),
        requester_id,
        purpose: "longitudinal wellbeing research".to_string(),
        scope: LabelMap::new(),
        eligibility_criteria: LabelMap::new(),
        duration_start: now(),
        duration_end: now() + 86_400 * 30,
        unit_type: UnitType::Survey,
        unit_price,
        max_participants,
        budget,
        escrow_id: None,
        status: RequestStatus::Screening,
    }
}

pub struct StraightThroughResult {
    pub request_id: Id,
    pub contract_id: Id,
    pub capsule_id: Id,
    pub ds_balance_pending: u64,
    pub yc_balance: u64,
    pub audit_receipt_count: u64,
}

/// S1: a request is screened and approved, a consent contract is formed,
/// escrow is funded and locked, a query plan is created and dispatched,
/// a Time Capsule is produced and verified, and settlement releases
/// escrow funds and issues the matching YC credits to the data subject.
pub fn run_straight_through_settlement(platform: &Platform) -> Result<StraightThroughResult, CoreError> {
    let requester_id = Id::new();
    let ds_id = Id::new();

    let request = approvable_request(requester_id, 1_000, 100, 5);
    platform.db.put_request(&request).map_err(CoreError::from)?;

    let screening = platform.screening.screen(request.id).map_err(CoreError::from)?;
    if screening.decision != ScreeningDecision::Approved {
        return Err(CoreError::InvalidState(format!(
            "expected APPROVED, got {:?}",
            screening.decision
        )));
    }

    let contract = platform
        .consent
        .create_consent(ConsentRequest {
            ds_id,
            requester_id,
            request_id: request.id,
            scope_hash: "a".repeat(64),
            purpose_hash: "b".repeat(64),
            duration_start: now(),
            duration_end: now() + 86_400 * 30,
            compensation_amount: 100,
            permitted_fields: vec!["domain.age_bracket".to_string()],
            sensitive_field_consents: Default::default(),
            output_restrictions: vec!["aggregate".to_string()],
            delivery_mode: DeliveryMode::CleanRoom,
        })
        .map_err(CoreError::from)?;
    if contract.status != ConsentStatus::Active {
        return Err(CoreError::InvalidState("consent contract not active".to_string()));
    }

    let escrow = platform
        .escrow
        .fund(requester_id, request.id, 100, &format!("FUND:{}", request.id))
        .map_err(CoreError::from)?;
    let escrow = platform
        .escrow
        .lock(escrow.id, 100, &format!("LOCK:{}", request.id))
        .map_err(CoreError::from)?;

    let plan = platform
        .plans
        .create_query_plan(CreatePlanRequest {
            requester_id,
            contract_id: contract.id,
            scope_hash: contract.scope_hash.clone(),
            transforms: vec!["aggregate".to_string()],
            ttl_minutes: 60,
        })
        .map_err(CoreError::from)?;
    platform
        .plans
        .dispatch(plan.id, &[ds_id], 30)
        .map_err(CoreError::from)?;

    let mut rng = thread_rng();
    let requester_private_key = RsaPrivateKey::new(&mut rng, 2048)
        .map_err(|e| CoreError::Other(e.to_string()))?;
    let requester_public_key = RsaPublicKey::from(&requester_private_key);

    let created = platform
        .capsules
        .create_capsule(CreateCapsuleRequest {
            plan: &plan,
            ds_node_id: ds_id,
            ttl_minutes: 60,
            payload: b"age_bracket=30-39".to_vec(),
            field_names: vec!["domain.age_bracket".to_string()],
            output_mode: "aggregate".to_string(),
            requester_public_key: &requester_public_key,
        })
        .map_err(CoreError::from)?;
    platform.capsules.verify_capsule(&created.capsule).map_err(CoreError::from)?;
    platform.capsules.mark_delivered(created.capsule.id).map_err(CoreError::from)?;

    let settled = platform
        .settlement
        .process_settlement(contract.id, ds_id, escrow.id, 100)
        .map_err(CoreError::from)?;

    let ds_balance = platform
        .db
        .get_ds_balance(&ds_id)
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::NotFound(format!("ds balance {ds_id}")))?;

    Ok(StraightThroughResult {
        request_id: request.id,
        contract_id: contract.id,
        capsule_id: created.capsule.id,
        ds_balance_pending: ds_balance.pending,
        yc_balance: settled.yc_token.balance,
        audit_receipt_count: platform.db.receipt_count(),
    })
}

/// S5: an attempt to transfer YC credits between data subjects is
/// rejected while transfers are disabled, but the rejection itself still
/// produces an audit receipt rather than failing silently.
pub fn run_yc_non_transferability(platform: &Platform) -> Result<(), CoreError> {
    let escrow = platform
        .escrow
        .fund(Id::new(), Id::new(), 50, &format!("FUND:{}", Id::new()))
        .map_err(CoreError::from)?;
    let escrow = platform
        .escrow
        .lock(escrow.id, 50, &format!("LOCK:{}", escrow.id))
        .map_err(CoreError::from)?;

    let from_ds = Id::new();
    let to_ds = Id::new();
    platform
        .settlement
        .process_settlement(Id::new(), from_ds, escrow.id, 50)
        .map_err(CoreError::from)?;

    let before = platform.db.receipt_count();
    let result = platform.credits.attempt_transfer(from_ds, to_ds, 20);
    let after = platform.db.receipt_count();

    if result.is_ok() {
        return Err(CoreError::InvalidState(
            "expected YC transfer to be rejected while transfers are disabled".to_string(),
        ));
    }
    if after <= before {
        return Err(CoreError::InvalidState(
            "rejected transfer did not produce an audit receipt".to_string(),
        ));
    }
    Ok(())
}
