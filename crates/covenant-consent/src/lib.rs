pub mod engine;
pub mod error;
pub mod obligations;

pub use engine::{ConsentEngine, ConsentRequest};
pub use error::ConsentError;
pub use obligations::{project_fields, FieldMap, ObligationEngine};
