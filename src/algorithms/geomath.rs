//! Flat-earth helpers for short-range guidance
//!
//! Both conversions assume a spherical earth of radius [`EARTH_RADIUS_M`] and
//! are only meant for offsets of a few kilometres away from the poles:
//! - `offset` scales the east component by `1 / cos(lat)`, which grows without
//!   bound as the latitude approaches ±90°.
//! - `distance` measures in decimal-degree space, so east-west separations are
//!   overstated by the same `1 / cos(lat)` factor. Below 1000 m and within ±8°
//!   of the equator the round trip `distance(o, offset(o, n, e))` stays within
//!   1 % of `hypot(n, e)`; pure north offsets are exact at any latitude.

use crate::core::{Frame, GeoPosition, EARTH_RADIUS_M, METRES_PER_DEGREE};

/// Geodetic computation errors
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeoError {
    /// Operands carry different altitude frames
    #[error("Frame mismatch: {left} position combined with {right} position")]
    FrameMismatch { left: Frame, right: Frame },
}

/// Result type for geodetic computations
pub type GeoResult<T> = Result<T, GeoError>;

/// Position `d_north` and `d_east` metres away from `origin`.
///
/// Frame and altitude are taken from `origin`.
pub fn offset(origin: &GeoPosition, d_north: f64, d_east: f64) -> GeoPosition {
    let d_lat = d_north / EARTH_RADIUS_M;
    let d_lon = d_east / (EARTH_RADIUS_M * origin.lat.to_radians().cos());

    origin.with_lat_lon(origin.lat + d_lat.to_degrees(), origin.lon + d_lon.to_degrees())
}

/// Approximate ground distance in metres between two positions of the same frame
pub fn distance(a: &GeoPosition, b: &GeoPosition) -> GeoResult<f64> {
    same_frame(a, b)?;

    let d_lat = b.lat - a.lat;
    let d_lon = b.lon - a.lon;
    Ok((d_lat * d_lat + d_lon * d_lon).sqrt() * METRES_PER_DEGREE)
}

/// North/east metres that `offset` would need to move `from` onto `to`
pub fn displacement(from: &GeoPosition, to: &GeoPosition) -> GeoResult<(f64, f64)> {
    same_frame(from, to)?;

    let d_north = (to.lat - from.lat).to_radians() * EARTH_RADIUS_M;
    let d_east = (to.lon - from.lon).to_radians() * EARTH_RADIUS_M * from.lat.to_radians().cos();
    Ok((d_north, d_east))
}

fn same_frame(a: &GeoPosition, b: &GeoPosition) -> GeoResult<()> {
    if a.frame() != b.frame() {
        return Err(GeoError::FrameMismatch {
            left: a.frame(),
            right: b.frame(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_north_from_equator() {
        let origin = GeoPosition::global_relative(0.0, 0.0, 10.0);
        let target = offset(&origin, 50.0, 0.0);

        let expected_lat = 50.0 / 6378137.0 * 180.0 / std::f64::consts::PI;
        assert!((target.lat - expected_lat).abs() < 1e-12);
        assert!((target.lat - 0.000449158).abs() < 1e-9);
        assert_eq!(target.lon, 0.0);
        assert_eq!(target.alt, 10.0);
        assert_eq!(target.frame(), Frame::GlobalRelative);
    }

    #[test]
    fn test_offset_preserves_altitude_and_frame() {
        let origins = [
            GeoPosition::global(47.6, -122.3, 120.0),
            GeoPosition::global_relative(-35.36, 149.16, 15.0),
            GeoPosition::global(0.0, 179.9, -3.0),
        ];
        for origin in origins {
            for (d_north, d_east) in [(0.0, 0.0), (120.0, -40.0), (-800.0, 999.0)] {
                let moved = offset(&origin, d_north, d_east);
                assert_eq!(moved.alt, origin.alt);
                assert_eq!(moved.frame(), origin.frame());
            }
        }
    }

    #[test]
    fn test_round_trip_distance_near_equator() {
        let origins = [
            GeoPosition::global_relative(0.0, 0.0, 0.0),
            GeoPosition::global_relative(5.0, 30.0, 0.0),
            GeoPosition::global(-4.5, -60.0, 0.0),
        ];
        for origin in origins {
            for (d_north, d_east) in [(50.0, 0.0), (0.0, 50.0), (300.0, -400.0), (-999.0, 10.0)] {
                let expected = f64::hypot(d_north, d_east);
                let measured = distance(&origin, &offset(&origin, d_north, d_east)).unwrap();
                assert!(
                    (measured - expected).abs() <= expected * 0.01,
                    "origin {} offset ({}, {}): {} vs {}",
                    origin, d_north, d_east, measured, expected
                );
            }
        }
    }

    #[test]
    fn test_round_trip_north_is_exact_at_high_latitude() {
        let origin = GeoPosition::global(60.0, 10.0, 0.0);
        let measured = distance(&origin, &offset(&origin, 750.0, 0.0)).unwrap();
        assert!((measured - 750.0).abs() < 0.01);
    }

    #[test]
    fn test_frame_mismatch_is_rejected() {
        let global = GeoPosition::global(1.0, 1.0, 0.0);
        let relative = GeoPosition::global_relative(1.0, 1.0, 0.0);

        assert_eq!(
            distance(&global, &relative),
            Err(GeoError::FrameMismatch { left: Frame::Global, right: Frame::GlobalRelative })
        );
        assert!(matches!(distance(&relative, &global), Err(GeoError::FrameMismatch { .. })));
        assert!(matches!(displacement(&global, &relative), Err(GeoError::FrameMismatch { .. })));
        assert!(matches!(displacement(&relative, &global), Err(GeoError::FrameMismatch { .. })));
    }

    #[test]
    fn test_displacement_inverts_offset() {
        let origin = GeoPosition::global_relative(-35.363261, 149.165230, 20.0);
        let (d_north, d_east) = displacement(&origin, &offset(&origin, 42.0, -17.5)).unwrap();
        assert!((d_north - 42.0).abs() < 1e-6);
        assert!((d_east + 17.5).abs() < 1e-6);
    }
}
