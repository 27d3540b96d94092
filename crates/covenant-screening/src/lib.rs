pub mod coordinator;
pub mod engine;
pub mod error;
pub mod rules;

pub use coordinator::{review, verify_stamp, HighRiskFinding, PolicyReview, ReviewDecision};
pub use engine::{estimate_cohort_size, ScreeningEngine};
pub use error::ScreeningError;
pub use rules::seed_built_in_rules;
