//! Shepard
//!
//! Guidance and landing-pad detection for a MAVLink autopilot: a telemetry
//! relay over TCP, blocking guidance commands with convergence polling, a
//! downward-camera detection pipeline with ground-plane geolocation, and a
//! route runner for pad searches.

pub mod core;
pub mod algorithms;
pub mod hardware;
pub mod telemetry;
pub mod vehicle;
pub mod api;
pub mod processing;
pub mod mission;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{BoundingBox, CameraIntrinsics, GeoPosition, HeadingCommand, InferenceRecord, VehicleMode, VehicleState};
pub use crate::algorithms::{Geolocator, GroundPlaneGeolocator};
pub use crate::hardware::{CommError, CommResult, LinkConfig, MavlinkTransport, Transport, TransportMessage};
pub use crate::telemetry::{LoopbackRelay, MessageRelay, RelayConfig, StatusTextSender, TelemetryRelay};
pub use crate::vehicle::{LocationProvider, MavlinkVehicle, ModeArbiter, Pose, SimVehicle, Vehicle, VehicleLocation};
pub use crate::api::{Convergence, GuidanceConfig, GuidanceController, GuidanceError, GuidanceResult};
pub use crate::processing::{DetectionPipeline, ImageFrame};
pub use crate::mission::{fly_route, FixedRoute, RouteGenerator, Waypoint};
pub use crate::utils::{CancelToken, SystemConfig};
