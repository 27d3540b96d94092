use covenant_core::ids::Id;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error("request {0} not found")]
    RequestNotFound(Id),

    #[error("request {0} is not in a screenable state")]
    InvalidScreeningState(Id),

    #[error("request {0} has already been screened")]
    AlreadyScreened(Id),

    #[error("screening result {0} not found")]
    ScreeningResultNotFound(Id),

    #[error("appeal already resolved for screening result {0}")]
    AppealAlreadyResolved(Id),

    #[error("policy signing key is not configured")]
    PolicyKeyNotConfigured,

    #[error("policy stamp verification failed for request {0}")]
    StampVerificationFailed(Id),

    #[error(transparent)]
    State(#[from] covenant_state::StateError),

    #[error(transparent)]
    Events(#[from] covenant_events::EventError),

    #[error(transparent)]
    Ledger(#[from] covenant_ledger::LedgerError),
}

impl From<ScreeningError> for covenant_core::error::CoreError {
    fn from(e: ScreeningError) -> Self {
        match e {
            ScreeningError::RequestNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("request {id}"))
            }
            ScreeningError::InvalidScreeningState(id) => {
                covenant_core::error::CoreError::InvalidState(format!("request {id}"))
            }
            ScreeningError::AlreadyScreened(id) => {
                covenant_core::error::CoreError::Duplicate(format!("screening for request {id}"))
            }
            ScreeningError::ScreeningResultNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("screening result {id}"))
            }
            ScreeningError::AppealAlreadyResolved(id) => {
                covenant_core::error::CoreError::InvalidState(format!(
                    "appeal for screening result {id}"
                ))
            }
            ScreeningError::PolicyKeyNotConfigured => covenant_core::error::CoreError::InvalidState(
                "policy_signing_key is required when require_configured_policy_key is set".to_string(),
            ),
            ScreeningError::StampVerificationFailed(id) => {
                covenant_core::error::CoreError::IntegrityFailure(format!(
                    "policy stamp for request {id} failed verification"
                ))
            }
            ScreeningError::State(err) => err.into(),
            ScreeningError::Events(err) => err.into(),
            ScreeningError::Ledger(err) => err.into(),
        }
    }
}
