use covenant_core::ids::Id;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("consent request is missing a required temporal, amount, or hash field")]
    InvalidConsentRequest,

    #[error("an active consent contract already exists for this data subject and request")]
    DuplicateConsent,

    #[error("consent contract {0} not found")]
    ContractNotFound(Id),

    #[error("contract {0} is not in a revocable state")]
    NotRevocable(Id),

    #[error("only the owning data subject may revoke contract {0}")]
    NotOwner(Id),

    #[error("obligation specification {0} is invalid")]
    InvalidObligationSpec(String),

    #[error("violation {0} not found")]
    ViolationNotFound(Id),

    #[error("penalty already applied for violation {0}")]
    PenaltyAlreadyApplied(Id),

    #[error(transparent)]
    State(#[from] covenant_state::StateError),

    #[error(transparent)]
    Events(#[from] covenant_events::EventError),

    #[error(transparent)]
    Ledger(#[from] covenant_ledger::LedgerError),
}

impl From<ConsentError> for covenant_core::error::CoreError {
    fn from(e: ConsentError) -> Self {
        match e {
            ConsentError::InvalidConsentRequest => {
                covenant_core::error::CoreError::ValidationFailure(e.to_string())
            }
            ConsentError::DuplicateConsent => covenant_core::error::CoreError::Duplicate(e.to_string()),
            ConsentError::ContractNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("consent contract {id}"))
            }
            ConsentError::NotRevocable(id) => {
                covenant_core::error::CoreError::InvalidState(format!("contract {id}"))
            }
            ConsentError::NotOwner(id) => {
                covenant_core::error::CoreError::Unauthorized(format!("contract {id}"))
            }
            ConsentError::InvalidObligationSpec(reason) => {
                covenant_core::error::CoreError::ValidationFailure(reason)
            }
            ConsentError::ViolationNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("violation {id}"))
            }
            ConsentError::PenaltyAlreadyApplied(id) => {
                covenant_core::error::CoreError::Duplicate(format!("penalty for violation {id}"))
            }
            ConsentError::State(err) => err.into(),
            ConsentError::Events(err) => err.into(),
            ConsentError::Ledger(err) => err.into(),
        }
    }
}
