//! Mission-level helpers built on the guidance API

pub mod landing;

pub use landing::{fly_route, FixedRoute, RouteGenerator, RouteProgress, Waypoint};
