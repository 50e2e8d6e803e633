//! Schema module - Configuration and chromosome description types.

mod chromosome;
mod config;
mod gene;

pub use chromosome::*;
pub use config::*;
pub use gene::*;
