//! Vehicle abstraction
//!
//! Guidance reads [`VehicleState`] snapshots and issues commands through the
//! [`Vehicle`] trait. Mode transitions go through the [`ModeArbiter`].

pub mod sim;
pub mod autopilot;
pub mod arbiter;

pub use sim::{SimCommand, SimConfig, SimVehicle};
pub use autopilot::MavlinkVehicle;
pub use arbiter::{ModeAck, ModeArbiter, ModeClient, ModeConfig, ModeTicket};

use crate::core::{GeoPosition, HeadingCommand, VehicleMode, VehicleState};
use crate::hardware::CommError;
use std::sync::Arc;

/// Vehicle command errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VehicleError {
    #[error("Link error: {0}")]
    Link(#[from] CommError),
    /// Vehicle refused the command in its current state
    #[error("Command {command} rejected: {reason}")]
    CommandRejected { command: String, reason: String },
    /// No autopilot heartbeat seen yet, so there is no one to address
    #[error("No autopilot heard on the link")]
    NoAutopilot,
    /// Mode arbiter thread is gone
    #[error("Mode arbiter stopped")]
    ArbiterStopped,
}

/// Result type for vehicle commands
pub type VehicleResult<T> = Result<T, VehicleError>;

/// Controllable vehicle
pub trait Vehicle: Send + Sync {
    /// Latest known state
    fn state(&self) -> VehicleState;

    /// Climb to `altitude` metres above home
    fn command_takeoff(&self, altitude: f64) -> VehicleResult<()>;

    /// Fly to `target`
    fn command_goto(&self, target: &GeoPosition) -> VehicleResult<()>;

    fn command_yaw(&self, heading: &HeadingCommand) -> VehicleResult<()>;

    /// Cruise ground speed (m/s)
    fn command_groundspeed(&self, speed: f64) -> VehicleResult<()>;

    /// Request a flight mode. Callers outside the mode arbiter should go
    /// through a [`ModeClient`] instead.
    fn command_mode(&self, mode: VehicleMode) -> VehicleResult<()>;
}

/// Vehicle position and heading taken from one state snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub location: GeoPosition,
    /// Degrees clockwise from north
    pub heading: f64,
}

impl Pose {
    pub fn altitude(&self) -> f64 {
        self.location.alt
    }
}

impl From<&VehicleState> for Pose {
    fn from(state: &VehicleState) -> Self {
        Self {
            location: state.location,
            heading: state.heading,
        }
    }
}

/// Position source for detection geolocation
pub trait LocationProvider: Send + Sync {
    /// Location and heading read together
    fn pose(&self) -> Pose;

    fn location(&self) -> GeoPosition {
        self.pose().location
    }

    /// Heading in degrees clockwise from north
    fn heading(&self) -> f64 {
        self.pose().heading
    }

    fn altitude(&self) -> f64 {
        self.location().alt
    }
}

/// Reads position from a shared vehicle
pub struct VehicleLocation {
    vehicle: Arc<dyn Vehicle>,
}

impl VehicleLocation {
    pub fn new(vehicle: Arc<dyn Vehicle>) -> Self {
        Self { vehicle }
    }
}

impl LocationProvider for VehicleLocation {
    fn pose(&self) -> Pose {
        Pose::from(&self.vehicle.state())
    }
}
