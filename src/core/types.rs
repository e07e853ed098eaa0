//! Core data types shared by guidance, telemetry and detection

use serde::{Deserialize, Serialize};
use std::fmt;

/// Altitude reference of a geodetic position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frame {
    /// Altitude above mean sea level
    Global,
    /// Altitude relative to the home (takeoff) altitude
    GlobalRelative,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Global => write!(f, "Global"),
            Frame::GlobalRelative => write!(f, "GlobalRelative"),
        }
    }
}

/// Geodetic position tagged with its altitude frame.
///
/// The frame is fixed at construction; every derived position keeps it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
    /// Altitude in metres, interpreted according to the frame
    pub alt: f64,
    frame: Frame,
}

impl GeoPosition {
    pub fn new(lat: f64, lon: f64, alt: f64, frame: Frame) -> Self {
        Self { lat, lon, alt, frame }
    }

    pub fn global(lat: f64, lon: f64, alt: f64) -> Self {
        Self::new(lat, lon, alt, Frame::Global)
    }

    pub fn global_relative(lat: f64, lon: f64, alt: f64) -> Self {
        Self::new(lat, lon, alt, Frame::GlobalRelative)
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Same frame and altitude, new horizontal coordinates
    pub fn with_lat_lon(&self, lat: f64, lon: f64) -> Self {
        Self::new(lat, lon, self.alt, self.frame)
    }

    /// Same frame and horizontal coordinates, new altitude
    pub fn with_alt(&self, alt: f64) -> Self {
        Self::new(self.lat, self.lon, alt, self.frame)
    }
}

impl fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.7}, {:.7}, {:.1} m {})", self.lat, self.lon, self.alt, self.frame)
    }
}

/// Metre displacement relative to the vehicle's current position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RelativeOffset {
    /// Horizontal move in the local north/east plane
    Horizontal { d_north: f64, d_east: f64 },
    /// Vertical move, positive up
    Vertical { d_altitude: f64 },
}

/// Yaw command in the vehicle's convention (clockwise from north)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingCommand {
    /// Heading in degrees; absolute headings are within [0, 360)
    pub degrees: f64,
    /// Whether `degrees` is relative to the current heading
    pub relative: bool,
}

impl HeadingCommand {
    pub fn absolute(degrees: f64) -> Self {
        Self {
            degrees: degrees.rem_euclid(360.0),
            relative: false,
        }
    }

    /// Relative turn; positive turns clockwise, negative counter-clockwise
    pub fn relative(degrees: f64) -> Self {
        Self { degrees, relative: true }
    }

    /// Turn direction as MAVLink expects it: 1 clockwise, -1 counter-clockwise
    pub fn direction(&self) -> f64 {
        if self.relative && self.degrees < 0.0 {
            -1.0
        } else {
            1.0
        }
    }

    /// Applies this command to a current heading
    pub fn resolve(&self, current_heading: f64) -> f64 {
        if self.relative {
            (current_heading + self.degrees).rem_euclid(360.0)
        } else {
            self.degrees
        }
    }
}

/// Autopilot flight mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleMode {
    Stabilize,
    Auto,
    Guided,
    Loiter,
    Rtl,
    Land,
    /// Any other ArduCopter custom mode number
    Other(u32),
}

impl VehicleMode {
    /// Mode token as the autopilot names it
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleMode::Stabilize => "STABILIZE",
            VehicleMode::Auto => "AUTO",
            VehicleMode::Guided => "GUIDED",
            VehicleMode::Loiter => "LOITER",
            VehicleMode::Rtl => "RTL",
            VehicleMode::Land => "LAND",
            VehicleMode::Other(_) => "UNKNOWN",
        }
    }

    /// ArduCopter custom mode number
    pub fn custom_mode(&self) -> u32 {
        match self {
            VehicleMode::Stabilize => 0,
            VehicleMode::Auto => 3,
            VehicleMode::Guided => 4,
            VehicleMode::Loiter => 5,
            VehicleMode::Rtl => 6,
            VehicleMode::Land => 9,
            VehicleMode::Other(mode) => *mode,
        }
    }

    pub fn from_custom_mode(mode: u32) -> Self {
        match mode {
            0 => VehicleMode::Stabilize,
            3 => VehicleMode::Auto,
            4 => VehicleMode::Guided,
            5 => VehicleMode::Loiter,
            6 => VehicleMode::Rtl,
            9 => VehicleMode::Land,
            other => VehicleMode::Other(other),
        }
    }
}

impl fmt::Display for VehicleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleMode::Other(mode) => write!(f, "MODE({})", mode),
            named => write!(f, "{}", named.as_str()),
        }
    }
}

/// Snapshot of the vehicle as reported by the autopilot
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    pub armed: bool,
    pub mode: VehicleMode,
    /// Ground speed (m/s)
    pub groundspeed: f64,
    /// Heading in degrees clockwise from north
    pub heading: f64,
    pub location: GeoPosition,
}

impl VehicleState {
    pub fn new(location: GeoPosition) -> Self {
        Self {
            armed: false,
            mode: VehicleMode::Stabilize,
            groundspeed: 0.0,
            heading: 0.0,
            location,
        }
    }
}

/// Axis-aligned detection rectangle in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// Camera model handed verbatim to the geolocation function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    focal_length: f64,
    angle_radians: f64,
    resolution: (u32, u32),
}

impl CameraIntrinsics {
    pub fn new(focal_length: f64, angle_radians: f64, resolution: (u32, u32)) -> Self {
        Self {
            focal_length,
            angle_radians,
            resolution,
        }
    }

    /// Focal length in pixels
    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }

    /// Tilt of the optical axis from nadir towards the vehicle's nose
    pub fn angle_radians(&self) -> f64 {
        self.angle_radians
    }

    /// Image size as (width, height) in pixels
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

/// Detection normalized to image size, paired with the altitude it was seen from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    pub x_norm: f64,
    pub y_norm: f64,
    pub relative_altitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_keeps_frame() {
        let origin = GeoPosition::global(1.0, 2.0, 30.0);
        assert_eq!(origin.with_alt(5.0).frame(), Frame::Global);
        assert_eq!(origin.with_lat_lon(3.0, 4.0).frame(), Frame::Global);
        assert_eq!(origin.with_lat_lon(3.0, 4.0).alt, 30.0);
    }

    #[test]
    fn test_heading_normalization() {
        assert_eq!(HeadingCommand::absolute(370.0).degrees, 10.0);
        assert_eq!(HeadingCommand::absolute(-90.0).degrees, 270.0);
        assert_eq!(HeadingCommand::relative(-90.0).degrees, -90.0);
        assert_eq!(HeadingCommand::relative(-90.0).direction(), -1.0);
        assert_eq!(HeadingCommand::relative(45.0).resolve(330.0), 15.0);
        assert_eq!(HeadingCommand::absolute(180.0).resolve(330.0), 180.0);
    }

    #[test]
    fn test_mode_tokens() {
        assert_eq!(VehicleMode::Guided.as_str(), "GUIDED");
        assert_eq!(VehicleMode::Land.as_str(), "LAND");
        assert_eq!(VehicleMode::Rtl.as_str(), "RTL");
        for mode in [VehicleMode::Guided, VehicleMode::Land, VehicleMode::Rtl, VehicleMode::Other(17)] {
            assert_eq!(VehicleMode::from_custom_mode(mode.custom_mode()), mode);
        }
    }
}
