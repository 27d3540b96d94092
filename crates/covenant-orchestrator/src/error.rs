use covenant_core::ids::Id;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("contract {0} is not active or has expired")]
    ContractNotUsable(Id),

    #[error("requested transforms are not a subset of the contract's allowed transforms")]
    TransformNotAllowed,

    #[error("query plan {0} not found")]
    PlanNotFound(Id),

    #[error("query plan {0} signature failed verification")]
    PlanSignatureInvalid(Id),

    #[error("query plan {0} has expired")]
    PlanExpired(Id),

    #[error("time capsule {0} not found")]
    CapsuleNotFound(Id),

    #[error("time capsule {0} hash does not match its recomputed value")]
    CapsuleHashMismatch(Id),

    #[error("time capsule {0} has an inconsistent contract id between header and proofs")]
    CapsuleContractMismatch(Id),

    #[error("time capsule {0} signature failed verification")]
    CapsuleSignatureInvalid(Id),

    #[error("time capsule {0} has expired")]
    CapsuleExpired(Id),

    #[error("nonce has already been used")]
    NonceReused,

    #[error("key {0} was already shredded")]
    AlreadyShredded(String),

    #[error("key {0} has been destroyed and cannot be used")]
    KeyDestroyed(String),

    #[error("key {0} not found in key store")]
    KeyNotFound(String),

    #[error(transparent)]
    Consent(#[from] covenant_consent::ConsentError),

    #[error(transparent)]
    State(#[from] covenant_state::StateError),

    #[error(transparent)]
    Events(#[from] covenant_events::EventError),

    #[error(transparent)]
    Ledger(#[from] covenant_ledger::LedgerError),

    #[error(transparent)]
    Crypto(#[from] covenant_crypto::CryptoError),

    #[error(transparent)]
    Signature(#[from] covenant_crypto::SignatureError),
}

impl From<OrchestratorError> for covenant_core::error::CoreError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::ContractNotUsable(id) => {
                covenant_core::error::CoreError::InvalidState(format!("contract {id}"))
            }
            OrchestratorError::TransformNotAllowed => {
                covenant_core::error::CoreError::ValidationFailure(
                    "requested transforms exceed contract's allowed transforms".to_string(),
                )
            }
            OrchestratorError::PlanNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("query plan {id}"))
            }
            OrchestratorError::PlanSignatureInvalid(id) => {
                covenant_core::error::CoreError::IntegrityFailure(format!("query plan {id} signature"))
            }
            OrchestratorError::PlanExpired(id) => {
                covenant_core::error::CoreError::InvalidState(format!("query plan {id} expired"))
            }
            OrchestratorError::CapsuleNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("time capsule {id}"))
            }
            OrchestratorError::CapsuleHashMismatch(id) => {
                covenant_core::error::CoreError::IntegrityFailure(format!("time capsule {id} hash"))
            }
            OrchestratorError::CapsuleContractMismatch(id) => {
                covenant_core::error::CoreError::IntegrityFailure(format!(
                    "time capsule {id} contract id mismatch"
                ))
            }
            OrchestratorError::CapsuleSignatureInvalid(id) => {
                covenant_core::error::CoreError::IntegrityFailure(format!("time capsule {id} signature"))
            }
            OrchestratorError::CapsuleExpired(id) => {
                covenant_core::error::CoreError::InvalidState(format!("time capsule {id} expired"))
            }
            OrchestratorError::NonceReused => {
                covenant_core::error::CoreError::Duplicate("nonce".to_string())
            }
            OrchestratorError::AlreadyShredded(key_id) => {
                covenant_core::error::CoreError::InvalidState(format!("key {key_id} already shredded"))
            }
            OrchestratorError::KeyDestroyed(key_id) => {
                covenant_core::error::CoreError::InvalidState(format!("key {key_id} destroyed"))
            }
            OrchestratorError::KeyNotFound(key_id) => {
                covenant_core::error::CoreError::NotFound(format!("key {key_id}"))
            }
            OrchestratorError::Consent(err) => err.into(),
            OrchestratorError::State(err) => err.into(),
            OrchestratorError::Events(err) => err.into(),
            OrchestratorError::Ledger(err) => err.into(),
            OrchestratorError::Crypto(err) => covenant_core::error::CoreError::Other(err.to_string()),
            OrchestratorError::Signature(err) => covenant_core::error::CoreError::IntegrityFailure(err.to_string()),
        }
    }
}
