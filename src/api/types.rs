//! Result, error and configuration types of the guidance API

use crate::algorithms::GeoError;
use crate::core::{
    VehicleMode, ALTITUDE_POLL_MS, ALTITUDE_TOLERANCE_M, POSITION_POLL_MS, POSITION_TOLERANCE_M,
    RELATIVE_TOLERANCE_FRACTION,
};
use crate::hardware::CommError;
use crate::vehicle::VehicleError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a blocking guidance call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Target reached within tolerance
    Converged,
    /// Vehicle left GUIDED before reaching the target; carries the mode it switched to
    ModeExited(VehicleMode),
    /// Cancellation token fired while waiting
    Cancelled,
}

impl Convergence {
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged)
    }
}

/// Guidance errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GuidanceError {
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error(transparent)]
    Vehicle(#[from] VehicleError),
    #[error(transparent)]
    Link(#[from] CommError),
    /// Configured timeout elapsed before convergence
    #[error("{operation} did not converge within {waited_ms} ms")]
    ConvergenceTimeout { operation: &'static str, waited_ms: u64 },
}

/// Result type for guidance operations
pub type GuidanceResult<T> = Result<T, GuidanceError>;

/// Polling and convergence parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceConfig {
    /// Poll period of horizontal moves (ms)
    pub position_poll_ms: u64,
    /// Poll period of climbs and readiness waits (ms)
    pub altitude_poll_ms: u64,
    /// Convergence radius of absolute moves (m)
    pub position_tolerance_m: f64,
    /// Convergence radius of relative moves as a fraction of the commanded distance
    pub relative_tolerance_fraction: f64,
    /// Altitude gap at which a climb is complete (m)
    pub altitude_tolerance_m: f64,
    /// Give up on convergence after this long (ms); `None` waits forever
    pub timeout_ms: Option<u64>,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            position_poll_ms: POSITION_POLL_MS,
            altitude_poll_ms: ALTITUDE_POLL_MS,
            position_tolerance_m: POSITION_TOLERANCE_M,
            relative_tolerance_fraction: RELATIVE_TOLERANCE_FRACTION,
            altitude_tolerance_m: ALTITUDE_TOLERANCE_M,
            timeout_ms: None,
        }
    }
}

impl GuidanceConfig {
    pub fn position_poll(&self) -> Duration {
        Duration::from_millis(self.position_poll_ms)
    }

    pub fn altitude_poll(&self) -> Duration {
        Duration::from_millis(self.altitude_poll_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
