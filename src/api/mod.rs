//! Guidance API
//!
//! Blocking guidance calls for mission code, plus the observer registry used
//! by the relay and the detection pipeline.

pub mod guidance;
pub mod callback;
pub mod types;

pub use guidance::GuidanceController;
pub use callback::{ListenerHandle, ListenerRegistry};
pub use types::{Convergence, GuidanceConfig, GuidanceError, GuidanceResult};
