//! Blocking guidance API
//!
//! Every movement call issues its command and then polls vehicle state at a
//! fixed interval until the move converges. Horizontal moves also stop, without
//! error, as soon as the vehicle leaves GUIDED; altitude changes do not watch
//! the mode. Without a configured timeout a
//! call can block forever; cancel it through the controller's [`CancelToken`].

use crate::algorithms::geomath;
use crate::api::types::{Convergence, GuidanceConfig, GuidanceError, GuidanceResult};
use crate::core::{GeoPosition, HeadingCommand, VehicleMode, VehicleState};
use crate::telemetry::StatusSink;
use crate::utils::cancel::CancelToken;
use crate::vehicle::{ModeClient, ModeTicket, Vehicle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const NAV: &str = "shepard::nav";

/// Drives one vehicle through blocking guidance commands
pub struct GuidanceController {
    vehicle: Arc<dyn Vehicle>,
    modes: ModeClient,
    config: GuidanceConfig,
    status: Option<Arc<dyn StatusSink>>,
    cancel: CancelToken,
}

impl GuidanceController {
    pub fn new(vehicle: Arc<dyn Vehicle>, modes: ModeClient, config: GuidanceConfig) -> Self {
        Self {
            vehicle,
            modes,
            config,
            status: None,
            cancel: CancelToken::new(),
        }
    }

    /// Deliver status messages to `sink` in addition to the local log
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = Some(sink);
        self
    }

    /// Use `cancel` to interrupt blocking calls
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }

    pub fn vehicle_state(&self) -> VehicleState {
        self.vehicle.state()
    }

    /// Ascend to `target_altitude` and wait until within the altitude tolerance
    pub fn takeoff(&self, target_altitude: f64) -> GuidanceResult<Convergence> {
        info!(target: NAV, altitude = target_altitude, "Taking off");
        self.vehicle.command_takeoff(target_altitude)?;

        let started = Instant::now();
        loop {
            let altitude = self.vehicle.state().location.alt;
            debug!(target: NAV, altitude, target_altitude, "Climbing");
            if altitude >= target_altitude - self.config.altitude_tolerance_m {
                info!(target: NAV, altitude, "Reached target altitude");
                return Ok(Convergence::Converged);
            }
            if let Some(stop) = self.wait_next("takeoff", started, self.config.altitude_poll())? {
                return Ok(stop);
            }
        }
    }

    /// Fly to `(lat, lon)` at the current altitude
    pub fn set_position(&self, lat: f64, lon: f64) -> GuidanceResult<Convergence> {
        let current = self.vehicle.state().location;
        let target = current.with_lat_lon(lat, lon);
        info!(target: NAV, destination = %target, "Going to position");

        self.vehicle.command_goto(&target)?;
        self.wait_position("set_position", &target, self.config.position_tolerance_m)
    }

    /// Fly `d_north`/`d_east` metres from the current position.
    ///
    /// Converges once the remaining distance is within a fraction of the
    /// commanded distance, not within the absolute tolerance of `set_position`.
    pub fn set_position_relative(&self, d_north: f64, d_east: f64) -> GuidanceResult<Convergence> {
        let current = self.vehicle.state().location;
        let target = geomath::offset(&current, d_north, d_east);
        let target_distance = geomath::distance(&current, &target)?;
        info!(target: NAV, d_north, d_east, target_distance, "Moving relative");

        self.vehicle.command_goto(&target)?;
        self.wait_position(
            "set_position_relative",
            &target,
            target_distance * self.config.relative_tolerance_fraction,
        )
    }

    /// Yaw to an absolute heading; does not wait
    pub fn set_heading(&self, degrees: f64) -> GuidanceResult<()> {
        let command = HeadingCommand::absolute(degrees);
        info!(target: NAV, heading = command.degrees, "Setting heading");
        self.vehicle.command_yaw(&command)?;
        Ok(())
    }

    /// Yaw by `degrees`, positive clockwise; does not wait
    pub fn set_heading_relative(&self, degrees: f64) -> GuidanceResult<()> {
        let command = HeadingCommand::relative(degrees);
        info!(target: NAV, turn = degrees, "Turning");
        self.vehicle.command_yaw(&command)?;
        Ok(())
    }

    /// Change altitude by reissuing the takeoff command until within the
    /// altitude tolerance. A lower target than the current altitude is
    /// already satisfied, so descents issue nothing.
    pub fn set_altitude(&self, altitude: f64) -> GuidanceResult<Convergence> {
        info!(target: NAV, altitude, "Setting altitude");
        self.climb_to("set_altitude", altitude)
    }

    /// `set_altitude` relative to the current altitude
    pub fn set_altitude_relative(&self, d_altitude: f64) -> GuidanceResult<Convergence> {
        let altitude = self.vehicle.state().location.alt + d_altitude;
        info!(target: NAV, d_altitude, altitude, "Changing altitude");
        self.climb_to("set_altitude_relative", altitude)
    }

    /// Cruise ground speed (m/s)
    pub fn set_groundspeed(&self, speed: f64) -> GuidanceResult<()> {
        info!(target: NAV, speed, "Setting ground speed");
        self.vehicle.command_groundspeed(speed)?;
        Ok(())
    }

    /// Request LAND. Drop the ticket to not wait for the vehicle.
    pub fn land(&self) -> GuidanceResult<ModeTicket> {
        info!(target: NAV, "Landing");
        Ok(self.modes.request(VehicleMode::Land)?)
    }

    /// Request RTL. Drop the ticket to not wait for the vehicle.
    pub fn return_to_launch(&self) -> GuidanceResult<ModeTicket> {
        info!(target: NAV, "Returning to launch");
        Ok(self.modes.request(VehicleMode::Rtl)?)
    }

    /// Log `text` and forward it to the status sink, if any
    pub fn send_status_message(&self, text: &str) -> GuidanceResult<()> {
        info!(target: NAV, text, "Status message");
        if let Some(sink) = &self.status {
            if let Err(e) = sink.send_status(text) {
                warn!(target: NAV, error = %e, "Status message not delivered");
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Block until the pilot has armed the vehicle and selected GUIDED
    pub fn wait_until_armed_and_guided(&self) -> GuidanceResult<Convergence> {
        info!(target: NAV, "Waiting for arming and GUIDED mode");
        let started = Instant::now();
        loop {
            let state = self.vehicle.state();
            if state.armed && state.mode == VehicleMode::Guided {
                info!(target: NAV, "Vehicle armed in GUIDED");
                return Ok(Convergence::Converged);
            }
            debug!(target: NAV, armed = state.armed, mode = %state.mode, "Vehicle not ready");
            if let Some(stop) = self.wait_next("wait_until_armed_and_guided", started, self.config.altitude_poll())? {
                return Ok(stop);
            }
        }
    }

    fn wait_position(
        &self,
        operation: &'static str,
        target: &GeoPosition,
        tolerance: f64,
    ) -> GuidanceResult<Convergence> {
        let started = Instant::now();
        loop {
            let state = self.vehicle.state();
            if state.mode != VehicleMode::Guided {
                info!(target: NAV, operation, mode = %state.mode, "Vehicle left GUIDED, move abandoned");
                return Ok(Convergence::ModeExited(state.mode));
            }

            let remaining = geomath::distance(&state.location, target)?;
            debug!(target: NAV, operation, remaining, tolerance, "Distance to target");
            if remaining <= tolerance {
                info!(target: NAV, operation, "Reached target");
                return Ok(Convergence::Converged);
            }

            if let Some(stop) = self.wait_next(operation, started, self.config.position_poll())? {
                return Ok(stop);
            }
        }
    }

    fn climb_to(&self, operation: &'static str, altitude: f64) -> GuidanceResult<Convergence> {
        let started = Instant::now();
        loop {
            let current = self.vehicle.state().location.alt;
            if current >= altitude - self.config.altitude_tolerance_m {
                info!(target: NAV, operation, altitude = current, "Reached altitude");
                return Ok(Convergence::Converged);
            }

            debug!(target: NAV, operation, current, altitude, "Reissuing takeoff");
            self.vehicle.command_takeoff(altitude)?;
            if let Some(stop) = self.wait_next(operation, started, self.config.altitude_poll())? {
                return Ok(stop);
            }
        }
    }

    /// Sleep one poll interval, cut short so a configured timeout is not
    /// overrun.
    ///
    /// Returns `Some(Cancelled)` if cancelled during the sleep and fails once
    /// the configured timeout has elapsed.
    fn wait_next(
        &self,
        operation: &'static str,
        started: Instant,
        interval: Duration,
    ) -> GuidanceResult<Option<Convergence>> {
        let mut sleep = interval;
        if let Some(timeout) = self.config.timeout() {
            let waited = started.elapsed();
            if waited >= timeout {
                warn!(target: NAV, operation, waited_ms = waited.as_millis() as u64, "Convergence timeout");
                return Err(GuidanceError::ConvergenceTimeout {
                    operation,
                    waited_ms: waited.as_millis() as u64,
                });
            }
            sleep = sleep.min(timeout - waited);
        }

        if self.cancel.wait(sleep) {
            info!(target: NAV, operation, "Cancelled");
            return Ok(Some(Convergence::Cancelled));
        }
        Ok(None)
    }
}
