//! Vehicle backed by a MAVLink autopilot
//!
//! State is fed by a relay listener (see [`MavlinkVehicle::listener`]);
//! commands leave through a [`FrameSink`], normally a [`RelayHandle`].
//!
//! [`RelayHandle`]: crate::telemetry::RelayHandle

use crate::core::{Frame, GeoPosition, HeadingCommand, VehicleMode, VehicleState};
use crate::hardware::TransportMessage;
use crate::telemetry::FrameSink;
use crate::vehicle::{Vehicle, VehicleError, VehicleResult};
use mavlink::common::{
    MavAutopilot, MavCmd, MavFrame, MavMessage, MavModeFlag, MavResult, MavType, PositionTargetTypemask,
    COMMAND_LONG_DATA, HEARTBEAT_DATA, SET_POSITION_TARGET_GLOBAL_INT_DATA,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Ignore velocity, acceleration, yaw and yaw rate; position only
const POSITION_ONLY_TYPE_MASK: u16 = 0x0DF8;

/// `DO_SET_MODE` base mode selecting the custom mode field
const CUSTOM_MODE_ENABLED: f32 = 1.0;

/// Gimbals, cameras and other peripherals report `MAV_AUTOPILOT_INVALID`
fn is_autopilot(heartbeat: &HEARTBEAT_DATA) -> bool {
    heartbeat.mavtype != MavType::MAV_TYPE_GCS && heartbeat.autopilot != MavAutopilot::MAV_AUTOPILOT_INVALID
}

struct LinkedState {
    state: VehicleState,
    target: Option<(u8, u8)>,
    last_ack: Option<(MavCmd, MavResult)>,
}

pub struct MavlinkVehicle {
    sink: Arc<dyn FrameSink>,
    shared: Arc<Mutex<LinkedState>>,
}

impl MavlinkVehicle {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            sink,
            shared: Arc::new(Mutex::new(LinkedState {
                state: VehicleState::new(GeoPosition::global_relative(0.0, 0.0, 0.0)),
                target: None,
                last_ack: None,
            })),
        }
    }

    /// Relay listener that keeps this vehicle's state current.
    ///
    /// The first autopilot heartbeat locks the vehicle to its sender; after
    /// that only frames from that `(system_id, component_id)` update state.
    pub fn listener(&self) -> impl Fn(&TransportMessage) + Send + Sync + 'static {
        let shared = Arc::clone(&self.shared);
        move |frame: &TransportMessage| {
            let source = (frame.header.system_id, frame.header.component_id);
            let mut linked = shared.lock();
            let from_target = linked.target.map_or(true, |target| target == source);
            match &frame.message {
                MavMessage::HEARTBEAT(data) => {
                    if !is_autopilot(data) {
                        return;
                    }
                    if !from_target {
                        trace!(system_id = source.0, component_id = source.1, "Heartbeat from another autopilot ignored");
                        return;
                    }
                    if linked.target.is_none() {
                        debug!(system_id = source.0, component_id = source.1, "Autopilot heard");
                        linked.target = Some(source);
                    }
                    linked.state.armed = data.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
                    linked.state.mode = VehicleMode::from_custom_mode(data.custom_mode);
                }
                _ if !from_target => {}
                MavMessage::GLOBAL_POSITION_INT(data) => {
                    linked.state.location = GeoPosition::global_relative(
                        data.lat as f64 / 1e7,
                        data.lon as f64 / 1e7,
                        data.relative_alt as f64 / 1000.0,
                    );
                    if data.hdg != u16::MAX {
                        linked.state.heading = data.hdg as f64 / 100.0;
                    }
                    linked.state.groundspeed = (data.vx as f64).hypot(data.vy as f64) / 100.0;
                }
                MavMessage::COMMAND_ACK(data) => {
                    if data.result != MavResult::MAV_RESULT_ACCEPTED {
                        warn!(command = ?data.command, result = ?data.result, "Command not accepted");
                    }
                    linked.last_ack = Some((data.command, data.result));
                }
                _ => {}
            }
        }
    }

    /// Most recent COMMAND_ACK from the autopilot
    pub fn last_command_ack(&self) -> Option<(MavCmd, MavResult)> {
        self.shared.lock().last_ack
    }

    /// Whether an autopilot heartbeat has been received
    pub fn is_linked(&self) -> bool {
        self.shared.lock().target.is_some()
    }

    fn target(&self) -> VehicleResult<(u8, u8)> {
        self.shared.lock().target.ok_or(VehicleError::NoAutopilot)
    }

    fn command_long(&self, command: MavCmd, params: [f32; 7]) -> VehicleResult<()> {
        let (target_system, target_component) = self.target()?;
        let [param1, param2, param3, param4, param5, param6, param7] = params;
        self.sink.send_frame(MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            param1,
            param2,
            param3,
            param4,
            param5,
            param6,
            param7,
            command,
            target_system,
            target_component,
            confirmation: 0,
        }))?;
        Ok(())
    }
}

impl Vehicle for MavlinkVehicle {
    fn state(&self) -> VehicleState {
        self.shared.lock().state.clone()
    }

    fn command_takeoff(&self, altitude: f64) -> VehicleResult<()> {
        self.command_long(MavCmd::MAV_CMD_NAV_TAKEOFF, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, altitude as f32])
    }

    fn command_goto(&self, target: &GeoPosition) -> VehicleResult<()> {
        let (target_system, target_component) = self.target()?;
        let coordinate_frame = match target.frame() {
            Frame::Global => MavFrame::MAV_FRAME_GLOBAL,
            Frame::GlobalRelative => MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT,
        };

        #[allow(deprecated)]
        let setpoint = SET_POSITION_TARGET_GLOBAL_INT_DATA {
            time_boot_ms: 0,
            target_system,
            target_component,
            coordinate_frame,
            type_mask: PositionTargetTypemask::from_bits_truncate(POSITION_ONLY_TYPE_MASK),
            lat_int: (target.lat * 1e7).round() as i32,
            lon_int: (target.lon * 1e7).round() as i32,
            alt: target.alt as f32,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            afx: 0.0,
            afy: 0.0,
            afz: 0.0,
            yaw: 0.0,
            yaw_rate: 0.0,
        };
        self.sink.send_frame(MavMessage::SET_POSITION_TARGET_GLOBAL_INT(setpoint))?;
        Ok(())
    }

    fn command_yaw(&self, heading: &HeadingCommand) -> VehicleResult<()> {
        let relative = if heading.relative { 1.0 } else { 0.0 };
        self.command_long(
            MavCmd::MAV_CMD_CONDITION_YAW,
            [
                heading.degrees.abs() as f32,
                0.0,
                heading.direction() as f32,
                relative,
                0.0,
                0.0,
                0.0,
            ],
        )
    }

    fn command_groundspeed(&self, speed: f64) -> VehicleResult<()> {
        self.command_long(MavCmd::MAV_CMD_DO_CHANGE_SPEED, [1.0, speed as f32, -1.0, 0.0, 0.0, 0.0, 0.0])
    }

    fn command_mode(&self, mode: VehicleMode) -> VehicleResult<()> {
        self.command_long(
            MavCmd::MAV_CMD_DO_SET_MODE,
            [CUSTOM_MODE_ENABLED, mode.custom_mode() as f32, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }
}
