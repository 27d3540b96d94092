use thiserror::Error;

/// Umbrella error type the workspace converts into at cross-crate call
/// sites and at the `covenant-node` composition root. Each subsystem
/// crate (`covenant-screening`, `covenant-consent`, …) owns its own
/// `thiserror` enum first; only here do they get flattened into one
/// taxonomy, via `#[from]`, matching §7's abstract error kinds.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("validation failed: {0}")]
    ValidationFailure(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("policy denied: {reason}")]
    PolicyDenied {
        reason: String,
        reason_codes: Vec<String>,
    },

    #[error("insufficient resource: {0}")]
    InsufficientResource(String),

    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// The abstract kind this error belongs to, for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "NotFound",
            CoreError::InvalidState(_) => "InvalidState",
            CoreError::Duplicate(_) => "Duplicate",
            CoreError::ValidationFailure(_) => "ValidationFailure",
            CoreError::Unauthorized(_) => "Unauthorized",
            CoreError::PolicyDenied { .. } => "PolicyDenied",
            CoreError::InsufficientResource(_) => "InsufficientResource",
            CoreError::IntegrityFailure(_) => "IntegrityFailure",
            CoreError::Transient(_) => "Transient",
            CoreError::Storage(_) => "Storage",
            CoreError::Serialization(_) => "Serialization",
            CoreError::Other(_) => "Other",
        }
    }
}

/// A stable, loggable error code paired with a human-readable message.
/// Subsystem error enums attach one of these per variant via a `code()`
/// method; this struct is what ends up in an audit receipt's details hash
/// and in structured logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableCode(pub &'static str);

impl std::fmt::Display for StableCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
