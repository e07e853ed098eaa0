//! Landing pad search route
//!
//! Route generation policy lives outside this crate behind [`RouteGenerator`].
//! [`fly_route`] drives a [`GuidanceController`] through whatever route it
//! produces, holding a fixed altitude.

use crate::api::{Convergence, GuidanceController, GuidanceResult};
use crate::core::RelativeOffset;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Route step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Waypoint {
    Absolute { lat: f64, lon: f64 },
    Relative(RelativeOffset),
}

/// Producer of search routes
pub trait RouteGenerator {
    fn generate_route(&mut self, count: usize) -> Vec<Waypoint>;
}

/// Replays a precomputed route
#[derive(Debug, Clone, Default)]
pub struct FixedRoute {
    waypoints: Vec<Waypoint>,
}

impl FixedRoute {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    /// Square of `side` metres flown clockwise from the start point
    pub fn square(side: f64) -> Self {
        let leg = |d_north, d_east| Waypoint::Relative(RelativeOffset::Horizontal { d_north, d_east });
        Self::new(vec![leg(side, 0.0), leg(0.0, side), leg(-side, 0.0), leg(0.0, -side)])
    }
}

impl RouteGenerator for FixedRoute {
    /// First `count` waypoints, cycling when the route is shorter
    fn generate_route(&mut self, count: usize) -> Vec<Waypoint> {
        self.waypoints.iter().copied().cycle().take(count).collect()
    }
}

/// How far a route got
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteProgress {
    /// Waypoints reached
    pub completed: usize,
    /// `Converged` when every waypoint was reached, otherwise why the route stopped
    pub outcome: Convergence,
}

/// Fly `route` at `altitude`, stopping at the first waypoint that does not converge
pub fn fly_route(nav: &GuidanceController, route: &[Waypoint], altitude: f64) -> GuidanceResult<RouteProgress> {
    info!(waypoints = route.len(), altitude, "Flying route");

    for (index, waypoint) in route.iter().enumerate() {
        let outcome = match nav.set_altitude(altitude)? {
            Convergence::Converged => fly_waypoint(nav, waypoint)?,
            stopped => stopped,
        };

        if outcome != Convergence::Converged {
            info!(waypoint = index, outcome = ?outcome, "Route interrupted");
            return Ok(RouteProgress {
                completed: index,
                outcome,
            });
        }
        info!(waypoint = index, "Waypoint reached");
    }

    Ok(RouteProgress {
        completed: route.len(),
        outcome: Convergence::Converged,
    })
}

fn fly_waypoint(nav: &GuidanceController, waypoint: &Waypoint) -> GuidanceResult<Convergence> {
    match *waypoint {
        Waypoint::Absolute { lat, lon } => nav.set_position(lat, lon),
        Waypoint::Relative(RelativeOffset::Horizontal { d_north, d_east }) => {
            nav.set_position_relative(d_north, d_east)
        }
        Waypoint::Relative(RelativeOffset::Vertical { d_altitude }) => nav.set_altitude_relative(d_altitude),
    }
}
