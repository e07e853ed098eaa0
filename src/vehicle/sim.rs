//! Kinematic vehicle simulator
//!
//! Time advances one step per [`Vehicle::state`] call, so a guidance loop
//! polling the simulator sees it move at a deterministic rate regardless of
//! wall-clock sleeps.

use crate::algorithms::geomath;
use crate::core::{GeoPosition, HeadingCommand, VehicleMode, VehicleState};
use crate::vehicle::{Vehicle, VehicleError, VehicleResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Simulator dynamics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Simulated seconds per state poll
    pub step_s: f64,
    /// Vertical speed (m/s)
    pub climb_rate: f64,
    /// Initial cruise ground speed (m/s)
    pub cruise_speed: f64,
    /// Polls between a mode command and the mode taking effect
    pub mode_latency_polls: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            step_s: 1.0,
            climb_rate: 3.0,
            cruise_speed: 5.0,
            mode_latency_polls: 0,
        }
    }
}

/// Command as received by the simulator
#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    Takeoff(f64),
    Goto(GeoPosition),
    Yaw(HeadingCommand),
    Groundspeed(f64),
    Mode(VehicleMode),
}

struct SimInner {
    state: VehicleState,
    home: GeoPosition,
    config: SimConfig,
    target: Option<GeoPosition>,
    target_alt: Option<f64>,
    polls: u64,
    /// (poll at which it applies, mode)
    pending_modes: Vec<(u64, VehicleMode)>,
    ignore_mode_commands: bool,
    log: Vec<SimCommand>,
}

impl SimInner {
    fn advance(&mut self) {
        self.polls += 1;

        let polls = self.polls;
        let mut due = Vec::new();
        self.pending_modes.retain(|(at, mode)| {
            if *at <= polls {
                due.push(*mode);
                false
            } else {
                true
            }
        });
        for mode in due {
            self.enter_mode(mode);
        }

        if !self.state.armed {
            self.state.groundspeed = 0.0;
            return;
        }

        match self.state.mode {
            VehicleMode::Guided => {
                if let Some(target) = self.target {
                    if self.move_towards(&target) {
                        self.target = None;
                    }
                } else {
                    self.state.groundspeed = 0.0;
                }
                self.climb_towards_target();
            }
            VehicleMode::Land => {
                self.state.groundspeed = 0.0;
                self.descend();
            }
            VehicleMode::Rtl => {
                let home = self.home;
                if self.move_towards(&home) {
                    self.descend();
                }
            }
            _ => self.state.groundspeed = 0.0,
        }
    }

    fn enter_mode(&mut self, mode: VehicleMode) {
        if mode != self.state.mode {
            self.target = None;
            self.target_alt = None;
        }
        self.state.mode = mode;
    }

    /// Returns true once `destination` is reached
    fn move_towards(&mut self, destination: &GeoPosition) -> bool {
        let (d_north, d_east) =
            geomath::displacement(&self.state.location, destination).unwrap_or((0.0, 0.0));
        let remaining = d_north.hypot(d_east);
        let reach = self.config.cruise_speed * self.config.step_s;

        if remaining <= reach {
            self.state.location = self.state.location.with_lat_lon(destination.lat, destination.lon);
            self.state.groundspeed = remaining / self.config.step_s;
            true
        } else {
            let scale = reach / remaining;
            self.state.location =
                geomath::offset(&self.state.location, d_north * scale, d_east * scale);
            self.state.groundspeed = self.config.cruise_speed;
            false
        }
    }

    fn climb_towards_target(&mut self) {
        if let Some(target_alt) = self.target_alt {
            let gap = target_alt - self.state.location.alt;
            let reach = self.config.climb_rate * self.config.step_s;
            let alt = if gap.abs() <= reach {
                target_alt
            } else {
                self.state.location.alt + reach * gap.signum()
            };
            self.state.location = self.state.location.with_alt(alt);
        }
    }

    fn descend(&mut self) {
        let alt = (self.state.location.alt - self.config.climb_rate * self.config.step_s).max(0.0);
        self.state.location = self.state.location.with_alt(alt);
        if alt <= 0.0 {
            self.state.armed = false;
        }
    }

    fn require_guided(&self, command: &str) -> VehicleResult<()> {
        if !self.state.armed {
            return Err(VehicleError::CommandRejected {
                command: command.to_string(),
                reason: "vehicle is disarmed".to_string(),
            });
        }
        if self.state.mode != VehicleMode::Guided {
            return Err(VehicleError::CommandRejected {
                command: command.to_string(),
                reason: format!("vehicle is in {} mode", self.state.mode),
            });
        }
        Ok(())
    }
}

/// Deterministic simulated copter
pub struct SimVehicle {
    inner: Mutex<SimInner>,
}

impl SimVehicle {
    /// Disarmed vehicle in STABILIZE sitting at `home`
    pub fn new(home: GeoPosition, config: SimConfig) -> Self {
        Self {
            inner: Mutex::new(SimInner {
                state: VehicleState::new(home),
                home,
                config,
                target: None,
                target_alt: None,
                polls: 0,
                pending_modes: Vec::new(),
                ignore_mode_commands: false,
                log: Vec::new(),
            }),
        }
    }

    /// Pilot arms the vehicle
    pub fn arm(&self) {
        let mut inner = self.inner.lock();
        inner.state.armed = true;
        inner.state.groundspeed = 0.0;
    }

    /// Mode switch from outside the ground station (e.g. the RC transmitter)
    pub fn set_mode(&self, mode: VehicleMode) {
        self.inner.lock().enter_mode(mode);
    }

    /// Switch to `mode` once `after_polls` more state polls have happened
    pub fn script_mode_change(&self, after_polls: u64, mode: VehicleMode) {
        let mut inner = self.inner.lock();
        let at = inner.polls + after_polls;
        inner.pending_modes.push((at, mode));
    }

    /// Accept mode commands without ever acting on them
    pub fn set_ignore_mode_commands(&self, ignore: bool) {
        self.inner.lock().ignore_mode_commands = ignore;
    }

    /// Commands received so far, oldest first
    pub fn commands(&self) -> Vec<SimCommand> {
        self.inner.lock().log.clone()
    }

    pub fn poll_count(&self) -> u64 {
        self.inner.lock().polls
    }

    /// Current state without advancing time
    pub fn peek(&self) -> VehicleState {
        self.inner.lock().state.clone()
    }
}

impl Vehicle for SimVehicle {
    fn state(&self) -> VehicleState {
        let mut inner = self.inner.lock();
        inner.advance();
        inner.state.clone()
    }

    fn command_takeoff(&self, altitude: f64) -> VehicleResult<()> {
        let mut inner = self.inner.lock();
        inner.log.push(SimCommand::Takeoff(altitude));
        inner.require_guided("takeoff")?;
        inner.target_alt = Some(altitude);
        Ok(())
    }

    fn command_goto(&self, target: &GeoPosition) -> VehicleResult<()> {
        let mut inner = self.inner.lock();
        inner.log.push(SimCommand::Goto(*target));
        inner.require_guided("goto")?;
        if target.frame() != inner.state.location.frame() {
            return Err(VehicleError::CommandRejected {
                command: "goto".to_string(),
                reason: format!("{} target in {} vehicle frame", target.frame(), inner.state.location.frame()),
            });
        }
        inner.target = Some(*target);
        inner.target_alt = Some(target.alt);
        Ok(())
    }

    fn command_yaw(&self, heading: &HeadingCommand) -> VehicleResult<()> {
        let mut inner = self.inner.lock();
        inner.log.push(SimCommand::Yaw(*heading));
        inner.state.heading = heading.resolve(inner.state.heading);
        Ok(())
    }

    fn command_groundspeed(&self, speed: f64) -> VehicleResult<()> {
        let mut inner = self.inner.lock();
        inner.log.push(SimCommand::Groundspeed(speed));
        if speed <= 0.0 {
            return Err(VehicleError::CommandRejected {
                command: "groundspeed".to_string(),
                reason: format!("speed must be positive, got {}", speed),
            });
        }
        inner.config.cruise_speed = speed;
        Ok(())
    }

    fn command_mode(&self, mode: VehicleMode) -> VehicleResult<()> {
        let mut inner = self.inner.lock();
        inner.log.push(SimCommand::Mode(mode));
        if inner.ignore_mode_commands {
            return Ok(());
        }
        if inner.config.mode_latency_polls == 0 {
            inner.enter_mode(mode);
        } else {
            let at = inner.polls + inner.config.mode_latency_polls;
            inner.pending_modes.push((at, mode));
        }
        Ok(())
    }
}
