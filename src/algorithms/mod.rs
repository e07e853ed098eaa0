//! Geodetic math and detection geolocation

pub mod geomath;
pub mod geolocation;

pub use geomath::{displacement, distance, offset, GeoError, GeoResult};
pub use geolocation::{Geolocator, GroundPlaneGeolocator};
