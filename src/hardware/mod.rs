//! Link abstraction for the autopilot connection
//!
//! The telemetry relay owns exactly one [`Transport`]; everything else talks
//! to the link through the relay.

pub mod transport;
pub mod mavlink_tcp;
pub mod mock;
pub mod error;

pub use transport::{Transport, LinkAddress, LinkConfig};
pub use mavlink_tcp::MavlinkTransport;
pub use mock::MockTransport;
pub use error::{CommError, CommResult};

use mavlink::common::MavMessage;
use mavlink::{MavHeader, Message};

/// Protocol frame as it travels over the link.
///
/// The relay never looks inside; listeners dispatch on [`type_tag`](Self::type_tag).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportMessage {
    pub header: MavHeader,
    pub message: MavMessage,
}

impl TransportMessage {
    pub fn new(header: MavHeader, message: MavMessage) -> Self {
        Self { header, message }
    }

    /// Frame originating from the given system/component with sequence 0
    pub fn from_system(system_id: u8, component_id: u8, message: MavMessage) -> Self {
        Self::new(
            MavHeader {
                system_id,
                component_id,
                sequence: 0,
            },
            message,
        )
    }

    /// Message name, e.g. `"HEARTBEAT"`
    pub fn type_tag(&self) -> &'static str {
        self.message.message_name()
    }

    pub fn message_id(&self) -> u32 {
        self.message.message_id()
    }
}
