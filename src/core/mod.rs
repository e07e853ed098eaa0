//! Core types and constants for guidance, telemetry and detection

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
