pub mod db;
pub mod error;
pub mod occ;

pub use db::StateDb;
pub use error::StateError;
pub use occ::retry_with_occ;
