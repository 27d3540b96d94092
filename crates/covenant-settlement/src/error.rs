use covenant_core::ids::Id;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("escrow {0} not found")]
    EscrowNotFound(Id),

    #[error("escrow {0} does not have enough available funds")]
    InsufficientEscrowFunds(Id),

    #[error("ds balance {0} not found")]
    DsBalanceNotFound(Id),

    #[error("ds balance {0} does not have enough available funds")]
    InsufficientBalance(Id),

    #[error("escrow {0} released amount does not reconcile with issued YC credits")]
    ReconciliationMismatch(Id),

    #[error("YC transfers are disabled")]
    YcTransferDisabled,

    #[error(transparent)]
    State(#[from] covenant_state::StateError),

    #[error(transparent)]
    Events(#[from] covenant_events::EventError),

    #[error(transparent)]
    Ledger(#[from] covenant_ledger::LedgerError),
}

impl From<SettlementError> for covenant_core::error::CoreError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::EscrowNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("escrow {id}"))
            }
            SettlementError::InsufficientEscrowFunds(id) => {
                covenant_core::error::CoreError::InsufficientResource(format!("escrow {id}"))
            }
            SettlementError::DsBalanceNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("ds balance {id}"))
            }
            SettlementError::InsufficientBalance(id) => {
                covenant_core::error::CoreError::InsufficientResource(format!("ds balance {id}"))
            }
            SettlementError::ReconciliationMismatch(id) => {
                covenant_core::error::CoreError::IntegrityFailure(format!("escrow {id} reconciliation"))
            }
            SettlementError::YcTransferDisabled => covenant_core::error::CoreError::PolicyDenied {
                reason: "YC credits are non-transferable".to_string(),
                reason_codes: vec!["YC_TRANSFER_DISABLED".to_string()],
            },
            SettlementError::State(err) => err.into(),
            SettlementError::Events(err) => err.into(),
            SettlementError::Ledger(err) => err.into(),
        }
    }
}
