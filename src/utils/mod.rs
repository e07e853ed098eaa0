//! Configuration, logging and cancellation utilities

pub mod config;
pub mod logging;
pub mod cancel;

pub use config::{ConfigError, ConfigResult, SystemConfig};
pub use logging::{init_logging, LogLevel};
pub use cancel::CancelToken;
