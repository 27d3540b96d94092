pub mod anchor;
pub mod chain;
pub mod error;
pub mod queries;

pub use anchor::Anchorer;
pub use chain::{AuditChain, GENESIS_PREV_HASH};
pub use error::LedgerError;
pub use queries::AuditQueries;
