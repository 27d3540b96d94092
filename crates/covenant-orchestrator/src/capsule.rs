//! Time Capsule creation, verification, crypto-shred and sweep (§4.4
//! second half). A capsule's AES data key lives only in the process-local
//! `KeyStore`; shredding it is what makes the payload permanently
//! unreadable, not deleting the ciphertext itself.

use std::sync::Arc;

use covenant_core::ids::{now, Hash32Hex, Id};
use covenant_core::query::{
    CapsuleHeader, CapsuleProofs, CapsuleStatus, CapsuleSummary, QueryPlan, TimeCapsule,
};
use covenant_crypto::join_fields;
use covenant_state::StateDb;
use rsa::RsaPublicKey;
use tracing::{info, warn};

use crate::error::OrchestratorError;
use crate::keystore::KeyStore;

pub struct CreateCapsuleRequest<'a> {
    pub plan: &'a QueryPlan,
    pub ds_node_id: Id,
    pub ttl_minutes: i64,
    pub payload: Vec<u8>,
    pub field_names: Vec<String>,
    pub output_mode: String,
    pub requester_public_key: &'a RsaPublicKey,
}

/// The wrapped data key travels with the capsule to its recipient but is
/// never persisted as part of `TimeCapsule` itself — the platform never
/// needs it again once delivery has happened.
pub struct CreatedCapsule {
    pub capsule: TimeCapsule,
    pub wrapped_data_key: Vec<u8>,
}

pub struct CapsuleOrchestrator {
    db: Arc<StateDb>,
    keystore: Arc<KeyStore>,
    signing_key_id: String,
}

impl CapsuleOrchestrator {
    pub fn new(db: Arc<StateDb>, keystore: Arc<KeyStore>, signing_key_id: impl Into<String>) -> Self {
        Self {
            db,
            keystore,
            signing_key_id: signing_key_id.into(),
        }
    }

    pub fn create_capsule(&self, req: CreateCapsuleRequest) -> Result<CreatedCapsule, OrchestratorError> {
        let now_ts = now();
        let capsule_id = Id::new();
        let (data_key, nonce) = covenant_crypto::generate_data_key();
        let key_id = format!("capsule:{capsule_id}");
        self.keystore.register_data_key(&key_id, data_key, nonce);

        let encrypted_payload = covenant_crypto::encrypt(&data_key, &nonce, &req.payload)?;
        let wrapped_data_key = covenant_crypto::wrap_data_key(req.requester_public_key, &data_key)?;

        let summary = CapsuleSummary {
            record_count: 1,
            field_names: req.field_names,
            payload_size_bytes: encrypted_payload.len() as u64,
            output_mode: req.output_mode,
        };
        let header = CapsuleHeader {
            capsule_id,
            plan_id: req.plan.id,
            contract_id: req.plan.contract_id,
            ttl: now_ts + req.ttl_minutes * 60,
            schema_version: "1".to_string(),
            summary,
            ds_node_id: req.ds_node_id,
            requester_id: req.plan.request_id,
        };

        let plan_hash = covenant_crypto::sha256_hex(req.plan.signable_payload().as_bytes());
        let capsule_hash = capsule_hash(&header, &encrypted_payload);
        let ds_signature = self.keystore.sign_with(&self.signing_key_id, capsule_hash.as_bytes())?;

        let proofs = CapsuleProofs {
            capsule_hash: capsule_hash.clone(),
            ds_signature,
            contract_id: req.plan.contract_id,
            plan_hash,
            signed_at: now_ts,
        };

        let field_manifest_hash = covenant_crypto::sha256_hex(header.summary.field_names.join(",").as_bytes());

        let capsule = TimeCapsule {
            id: capsule_id,
            version: 0,
            created_at: now_ts,
            contract_id: req.plan.contract_id,
            plan_id: req.plan.id,
            field_manifest_hash,
            encrypted_payload,
            encryption_key_id: key_id,
            ttl: header.ttl,
            nonce,
            status: CapsuleStatus::Created,
            delivered_at: None,
            deleted_at: None,
            header,
            proofs,
        };

        if !self.db.register_nonce(&capsule.nonce)? {
            return Err(OrchestratorError::NonceReused);
        }
        self.db.put_time_capsule(&capsule)?;
        info!(capsule_id = %capsule_id, "time capsule created");

        Ok(CreatedCapsule {
            capsule,
            wrapped_data_key,
        })
    }

    /// Rejects capsules whose recomputed hash differs, whose `contractId`
    /// disagrees between header and proofs, whose signature fails, or
    /// whose TTL has lapsed.
    pub fn verify_capsule(&self, capsule: &TimeCapsule) -> Result<(), OrchestratorError> {
        let recomputed = capsule_hash(&capsule.header, &capsule.encrypted_payload);
        if recomputed != capsule.proofs.capsule_hash {
            return Err(OrchestratorError::CapsuleHashMismatch(capsule.id));
        }
        if capsule.header.contract_id != capsule.proofs.contract_id {
            return Err(OrchestratorError::CapsuleContractMismatch(capsule.id));
        }
        let public_key = self.keystore.public_key_bytes(&self.signing_key_id)?;
        covenant_crypto::verify(
            &public_key,
            capsule.proofs.capsule_hash.as_bytes(),
            &capsule.proofs.ds_signature,
        )
        .map_err(|_| OrchestratorError::CapsuleSignatureInvalid(capsule.id))?;
        if capsule.is_expired(now()) {
            return Err(OrchestratorError::CapsuleExpired(capsule.id));
        }
        Ok(())
    }

    pub fn mark_delivered(&self, capsule_id: Id) -> Result<TimeCapsule, OrchestratorError> {
        let mut capsule = self
            .db
            .get_time_capsule(&capsule_id)?
            .ok_or(OrchestratorError::CapsuleNotFound(capsule_id))?;
        capsule.status = CapsuleStatus::Delivered;
        capsule.delivered_at = Some(now());
        capsule.version += 1;
        self.db.put_time_capsule(&capsule)?;
        Ok(capsule)
    }

    /// Idempotent: a second shred of the same capsule returns
    /// `AlreadyShredded`.
    pub fn crypto_shred(&self, capsule_id: Id) -> Result<TimeCapsule, OrchestratorError> {
        let mut capsule = self
            .db
            .get_time_capsule(&capsule_id)?
            .ok_or(OrchestratorError::CapsuleNotFound(capsule_id))?;
        self.keystore.shred(&capsule.encryption_key_id)?;
        capsule.status = CapsuleStatus::Shredded;
        capsule.deleted_at = Some(now());
        capsule.version += 1;
        self.db.put_time_capsule(&capsule)?;
        info!(capsule_id = %capsule_id, "capsule key shredded");
        Ok(capsule)
    }

    /// Processes every capsule whose `ttl < now` and shreds its key.
    /// Run at least as often as `ttl_min / 2`.
    pub fn sweep(&self) -> Result<Vec<Id>, OrchestratorError> {
        let now_ts = now();
        let mut shredded = Vec::new();
        for capsule in self.db.iter_time_capsules()? {
            if capsule.ttl >= now_ts || matches!(capsule.status, CapsuleStatus::Shredded) {
                continue;
            }
            match self.crypto_shred(capsule.id) {
                Ok(_) => shredded.push(capsule.id),
                Err(OrchestratorError::AlreadyShredded(_)) => {}
                Err(err) => warn!(capsule_id = %capsule.id, error = %err, "sweep failed to shred capsule"),
            }
        }
        Ok(shredded)
    }
}

fn capsule_hash(header: &CapsuleHeader, encrypted_payload: &[u8]) -> Hash32Hex {
    let header_json = serde_json::to_string(header).expect("capsule header always serializes");
    let payload_hex = hex::encode(encrypted_payload);
    let canonical = join_fields(&[&header_json, &payload_hex]);
    covenant_crypto::sha256_hex(canonical.as_bytes())
}
