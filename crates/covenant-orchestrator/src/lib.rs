pub mod capsule;
pub mod error;
pub mod keystore;
pub mod plan;

pub use capsule::{CapsuleOrchestrator, CreateCapsuleRequest, CreatedCapsule};
pub use error::OrchestratorError;
pub use keystore::KeyStore;
pub use plan::{CreatePlanRequest, DispatchRecord, DispatchResult, PlanOrchestrator};
