//! Physical constants and link parameters

/// Radius of the spherical earth used for metre offsets (m)
pub const EARTH_RADIUS_M: f64 = 6378137.0;

/// Approximate metres per decimal degree at the equator
pub const METRES_PER_DEGREE: f64 = 1.113195e5;

/// MAVLink system id this ground station identifies itself with
pub const GCS_SYSTEM_ID: u8 = 255;

/// MAVLink component id this ground station identifies itself with
pub const GCS_COMPONENT_ID: u8 = 10;

/// Default autopilot link
pub const DEFAULT_CONNECTION: &str = "tcp:127.0.0.1:14550";

/// Keep-alive period of the telemetry relay (ms)
pub const HEARTBEAT_INTERVAL_MS: u64 = 1000;

/// Poll period while converging on a horizontal target (ms)
pub const POSITION_POLL_MS: u64 = 2000;

/// Poll period while converging on an altitude (ms)
pub const ALTITUDE_POLL_MS: u64 = 1000;

/// Absolute convergence radius of `set_position` (m)
pub const POSITION_TOLERANCE_M: f64 = 0.1;

/// Convergence radius of `set_position_relative` as a fraction of the commanded distance
pub const RELATIVE_TOLERANCE_FRACTION: f64 = 0.01;

/// Altitude gap at which climbs are considered complete (m)
pub const ALTITUDE_TOLERANCE_M: f64 = 1.0;
