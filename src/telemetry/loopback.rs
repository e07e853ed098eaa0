//! Loopback relay for tests and simulation
//!
//! `send` delivers the frame straight to local listeners as if it had come
//! back over the link. There is no link to pump, so `run` is refused.

use crate::api::callback::{ListenerHandle, ListenerRegistry};
use crate::core::{GCS_COMPONENT_ID, GCS_SYSTEM_ID};
use crate::hardware::{CommError, CommResult, TransportMessage};
use crate::telemetry::relay::{FrameSink, MessageListener, MessageRelay};
use crate::utils::cancel::CancelToken;
use mavlink::common::MavMessage;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone, Default)]
pub struct LoopbackRelay {
    listeners: Arc<ListenerRegistry<MessageListener>>,
}

impl LoopbackRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand `message` to every listener, stamped with the ground station identity
    pub fn deliver(&self, message: MavMessage) {
        let frame = TransportMessage::from_system(GCS_SYSTEM_ID, GCS_COMPONENT_ID, message);
        trace!(message = frame.type_tag(), "Loopback delivery");
        for listener in self.listeners.snapshot() {
            listener(&frame);
        }
    }
}

impl MessageRelay for LoopbackRelay {
    fn send(&mut self, message: &MavMessage) -> CommResult<()> {
        self.deliver(message.clone());
        Ok(())
    }

    fn subscribe(&self, listener: Arc<MessageListener>) -> ListenerHandle {
        self.listeners.subscribe(listener)
    }

    fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        self.listeners.unsubscribe(handle)
    }

    fn run(&mut self, _cancel: &CancelToken) -> CommResult<()> {
        Err(CommError::Unsupported {
            operation: "run on loopback relay".to_string(),
        })
    }
}

impl FrameSink for LoopbackRelay {
    fn send_frame(&self, message: MavMessage) -> CommResult<()> {
        self.deliver(message);
        Ok(())
    }
}
