//! In-memory transport for exercising the relay without a link

use crate::hardware::{CommError, CommResult, Transport, TransportMessage};
use mavlink::common::MavMessage;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct MockState {
    inbound: VecDeque<TransportMessage>,
    sent: Vec<MavMessage>,
    connected: bool,
    recv_attempts: usize,
}

/// Scripted transport.
///
/// Clones share the same queues, so a test can keep one handle while the
/// relay owns another.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                connected: true,
                ..MockState::default()
            })),
        }
    }

    /// Queue an inbound frame
    pub fn push_inbound(&self, message: TransportMessage) {
        self.state.lock().inbound.push_back(message);
    }

    /// Frames written so far
    pub fn sent_messages(&self) -> Vec<MavMessage> {
        self.state.lock().sent.clone()
    }

    pub fn clear_sent_messages(&self) {
        self.state.lock().sent.clear();
    }

    pub fn queued_message_count(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// Number of `try_recv` calls, including empty ones
    pub fn recv_attempts(&self) -> usize {
        self.state.lock().recv_attempts
    }

    /// Simulate the peer going away
    pub fn disconnect(&self) {
        self.state.lock().connected = false;
    }
}

impl Transport for MockTransport {
    fn try_recv(&mut self) -> CommResult<Option<TransportMessage>> {
        let mut state = self.state.lock();
        state.recv_attempts += 1;
        if !state.connected {
            return Err(CommError::ConnectionLost {
                address: "mock".to_string(),
            });
        }
        Ok(state.inbound.pop_front())
    }

    fn send(&mut self, message: &MavMessage) -> CommResult<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(CommError::ConnectionLost {
                address: "mock".to_string(),
            });
        }
        state.sent.push(message.clone());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }
}
