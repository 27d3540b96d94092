use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    State(#[from] covenant_state::StateError),

    #[error("event {0} not found")]
    NotFound(covenant_core::ids::Id),
}

impl From<EventError> for covenant_core::error::CoreError {
    fn from(e: EventError) -> Self {
        match e {
            EventError::State(err) => err.into(),
            EventError::NotFound(id) => covenant_core::error::CoreError::NotFound(id.to_string()),
        }
    }
}
