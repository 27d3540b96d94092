pub mod credits;
pub mod error;
pub mod escrow;
pub mod payout;
pub mod settlement;

pub use credits::CreditsEngine;
pub use error::SettlementError;
pub use escrow::EscrowEngine;
pub use payout::PayoutEngine;
pub use settlement::{SettlementCoordinator, SettlementResult};
