//! Shared entity types, identifiers, error taxonomy and configuration for
//! the Covenant data-sovereignty platform. Every other workspace crate
//! depends on this one; it depends on nothing workspace-internal.

pub mod clock;
pub mod config;
pub mod consent;
pub mod constants;
pub mod error;
pub mod events;
pub mod governor;
pub mod ids;
pub mod ledger;
pub mod query;
pub mod request;
pub mod settlement;

pub use clock::{now, Clock, FixedClock, SystemClock};
pub use config::CovenantConfig;
pub use consent::*;
pub use error::{CoreError, StableCode};
pub use events::*;
pub use governor::*;
pub use ids::{Hash32Hex, Id, Timestamp};
pub use ledger::*;
pub use query::*;
pub use request::*;
pub use settlement::*;
