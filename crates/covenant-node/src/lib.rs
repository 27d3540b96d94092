pub mod platform;
pub mod scenario;

pub use platform::Platform;
