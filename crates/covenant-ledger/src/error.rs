use covenant_core::ids::Id;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("audit receipt {0} not found")]
    ReceiptNotFound(Id),

    #[error("merkle batch {0} not found")]
    BatchNotFound(Id),

    #[error("receipt {0} is not part of batch {1}")]
    ReceiptNotInBatch(Id, Id),

    #[error("chain integrity failure at sequence {0}: recomputed hash does not match stored hash")]
    IntegrityFailure(u64),

    #[error("no unanchored receipts available to anchor")]
    NothingToAnchor,

    #[error(transparent)]
    State(#[from] covenant_state::StateError),

    #[error(transparent)]
    Events(#[from] covenant_events::EventError),
}

impl From<LedgerError> for covenant_core::error::CoreError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ReceiptNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("audit receipt {id}"))
            }
            LedgerError::BatchNotFound(id) => {
                covenant_core::error::CoreError::NotFound(format!("merkle batch {id}"))
            }
            LedgerError::ReceiptNotInBatch(receipt, batch) => {
                covenant_core::error::CoreError::ValidationFailure(format!(
                    "receipt {receipt} not in batch {batch}"
                ))
            }
            LedgerError::IntegrityFailure(seq) => {
                covenant_core::error::CoreError::IntegrityFailure(format!(
                    "chain broken at sequence {seq}"
                ))
            }
            LedgerError::NothingToAnchor => {
                covenant_core::error::CoreError::InvalidState(e.to_string())
            }
            LedgerError::State(err) => err.into(),
            LedgerError::Events(err) => err.into(),
        }
    }
}
