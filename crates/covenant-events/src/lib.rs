pub mod bus;
pub mod error;

pub use bus::{DrainSummary, EventBus};
pub use error::EventError;
