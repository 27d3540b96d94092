use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    #[error("optimistic retry budget exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },
}

impl From<StateError> for covenant_core::error::CoreError {
    fn from(e: StateError) -> Self {
        let message = e.to_string();
        match e {
            StateError::Storage(err) => covenant_core::error::CoreError::Storage(err.to_string()),
            StateError::Serialization(err) => {
                covenant_core::error::CoreError::Serialization(err.to_string())
            }
            StateError::VersionConflict { .. } => covenant_core::error::CoreError::Transient(message),
            StateError::RetryExhausted { .. } => covenant_core::error::CoreError::Transient(message),
        }
    }
}
