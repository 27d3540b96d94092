pub mod coordinator;
pub mod error;
pub mod kanon;
pub mod linkage;
pub mod prb;

pub use coordinator::{GovernorCheckRequest, GovernorDecision, PrivacyGovernor};
pub use error::GovernorError;
pub use kanon::KAnonymityGate;
pub use linkage::LinkageGate;
pub use prb::PrbGate;
