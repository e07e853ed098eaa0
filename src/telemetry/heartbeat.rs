//! Keep-alive frame

use mavlink::common::{MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA};

/// Heartbeat with every field zeroed.
///
/// The ground station only signals link liveness; it claims no vehicle type,
/// autopilot or mode.
pub fn heartbeat_message() -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_GENERIC,
        autopilot: MavAutopilot::MAV_AUTOPILOT_GENERIC,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_UNINIT,
        mavlink_version: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_is_zeroed() {
        match heartbeat_message() {
            MavMessage::HEARTBEAT(data) => {
                assert_eq!(data.custom_mode, 0);
                assert_eq!(data.mavtype as u32, 0);
                assert_eq!(data.autopilot as u32, 0);
                assert!(data.base_mode.is_empty());
                assert_eq!(data.system_status as u32, 0);
                assert_eq!(data.mavlink_version, 0);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
