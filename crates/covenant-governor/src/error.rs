use covenant_core::ids::Id;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("gate denied: {reason}")]
    Denied {
        reason: String,
        reason_codes: Vec<String>,
    },

    #[error("PRB for data subject {0} not found")]
    PrbNotFound(Id),

    #[error("PRB for data subject {0} is locked and cannot be reallocated")]
    PrbLocked(Id),

    #[error(transparent)]
    State(#[from] covenant_state::StateError),

    #[error(transparent)]
    Events(#[from] covenant_events::EventError),

    #[error(transparent)]
    Ledger(#[from] covenant_ledger::LedgerError),
}

impl From<GovernorError> for covenant_core::error::CoreError {
    fn from(e: GovernorError) -> Self {
        match e {
            GovernorError::Denied { reason, reason_codes } => {
                covenant_core::error::CoreError::PolicyDenied { reason, reason_codes }
            }
            GovernorError::PrbNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("prb {id}"))
            }
            GovernorError::PrbLocked(id) => {
                covenant_core::error::CoreError::InvalidState(format!("prb {id} is locked"))
            }
            GovernorError::State(err) => err.into(),
            GovernorError::Events(err) => err.into(),
            GovernorError::Ledger(err) => err.into(),
        }
    }
}
