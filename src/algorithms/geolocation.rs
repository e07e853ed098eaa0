//! Geolocation of image detections
//!
//! The detection pipeline hands every inference to a [`Geolocator`] together
//! with the camera intrinsics and the vehicle [`Pose`] the inference was
//! built from. [`GroundPlaneGeolocator`] is the stock implementation: it
//! casts a pinhole ray through the detection, tilts it by the camera mount
//! angle, turns it by the vehicle heading and intersects it with flat ground
//! `relative_altitude` metres below the camera.

use crate::algorithms::geomath;
use crate::core::{CameraIntrinsics, InferenceRecord};
use crate::vehicle::{LocationProvider, Pose};
use nalgebra::{Rotation3, Vector3};
use std::sync::Arc;

/// Smallest downward component, relative to ray length, that still meets the ground
const HORIZON_EPSILON: f64 = 1e-9;

/// Converts a normalized detection into a ground coordinate
pub trait Geolocator: Send {
    /// Returns `(longitude, latitude)` of the detection, or `None` when the
    /// detection cannot be placed on the ground.
    fn get_object_location(
        &self,
        camera: &CameraIntrinsics,
        inference: &InferenceRecord,
    ) -> Option<(f64, f64)>;

    /// Same as [`get_object_location`](Self::get_object_location), anchored at
    /// a pose the caller already read
    fn get_object_location_at(
        &self,
        camera: &CameraIntrinsics,
        inference: &InferenceRecord,
        _pose: &Pose,
    ) -> Option<(f64, f64)> {
        self.get_object_location(camera, inference)
    }
}

/// Flat-ground pinhole projection anchored at the vehicle's position
pub struct GroundPlaneGeolocator {
    location: Arc<dyn LocationProvider>,
}

impl GroundPlaneGeolocator {
    pub fn new(location: Arc<dyn LocationProvider>) -> Self {
        Self { location }
    }

    /// Ray through the detection in the local north-east-down frame
    fn ray_ned(&self, camera: &CameraIntrinsics, inference: &InferenceRecord, heading_deg: f64) -> Vector3<f64> {
        let (width, height) = camera.resolution();
        let u = (inference.x_norm - 0.5) * width as f64;
        let v = (inference.y_norm - 0.5) * height as f64;

        // Camera looks straight down with the image top towards the nose:
        // image right is body right, image down is body aft.
        let ray_body = Vector3::new(-v, u, camera.focal_length());
        let tilt = Rotation3::from_axis_angle(&Vector3::y_axis(), camera.angle_radians());
        let yaw = Rotation3::from_axis_angle(&Vector3::z_axis(), heading_deg.to_radians());

        yaw * tilt * ray_body
    }
}

impl Geolocator for GroundPlaneGeolocator {
    fn get_object_location(
        &self,
        camera: &CameraIntrinsics,
        inference: &InferenceRecord,
    ) -> Option<(f64, f64)> {
        self.get_object_location_at(camera, inference, &self.location.pose())
    }

    fn get_object_location_at(
        &self,
        camera: &CameraIntrinsics,
        inference: &InferenceRecord,
        pose: &Pose,
    ) -> Option<(f64, f64)> {
        if inference.relative_altitude <= 0.0 {
            return None;
        }

        let ray = self.ray_ned(camera, inference, pose.heading);
        // at or above the horizon
        if ray.z <= ray.norm() * HORIZON_EPSILON {
            return None;
        }

        let scale = inference.relative_altitude / ray.z;
        let target = geomath::offset(&pose.location, ray.x * scale, ray.y * scale);
        Some((target.lon, target.lat))
    }
}
