//! Telemetry relay
//!
//! One loop owns the transport. Each iteration it writes frames queued by
//! other threads, then attempts one non-blocking receive:
//! - a frame is handed to every listener in registration order and the loop
//!   goes straight back to receiving, without looking at the heartbeat clock;
//! - an empty receive emits a heartbeat once the heartbeat interval has
//!   elapsed since the previous one.
//!
//! Sustained inbound traffic therefore delays heartbeats indefinitely.

use crate::api::callback::{ListenerHandle, ListenerRegistry};
use crate::core::HEARTBEAT_INTERVAL_MS;
use crate::hardware::{CommError, CommResult, Transport, TransportMessage};
use crate::telemetry::heartbeat::heartbeat_message;
use crate::utils::cancel::CancelToken;
use mavlink::common::MavMessage;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, trace, warn};

/// Inbound frame callback
pub type MessageListener = dyn Fn(&TransportMessage) + Send + Sync;

/// Anything that can put a frame on the link from any thread
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, message: MavMessage) -> CommResult<()>;
}

/// Common surface of the real relay and its loopback double
pub trait MessageRelay {
    /// Transmit one frame
    fn send(&mut self, message: &MavMessage) -> CommResult<()>;

    fn subscribe(&self, listener: Arc<MessageListener>) -> ListenerHandle;

    fn unsubscribe(&self, handle: ListenerHandle) -> bool;

    /// Pump the link until cancelled or a fatal link error
    fn run(&mut self, cancel: &CancelToken) -> CommResult<()>;
}

/// Relay timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Minimum gap between heartbeats (ms)
    pub heartbeat_interval_ms: u64,
    /// Sleep after an empty receive (ms); 0 spins
    pub idle_poll_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            idle_poll_ms: 0,
        }
    }
}

impl RelayConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

/// What one loop iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A frame was delivered to the listeners
    Forwarded,
    /// Nothing arrived and a heartbeat went out
    Heartbeat,
    /// Nothing arrived and no heartbeat was due
    Idle,
}

/// Cloneable access to a relay whose loop runs on another thread
#[derive(Clone)]
pub struct RelayHandle {
    outbound: Sender<MavMessage>,
    listeners: Arc<ListenerRegistry<MessageListener>>,
}

impl RelayHandle {
    /// Queue a frame; the relay loop writes it on its next iteration
    pub fn send(&self, message: MavMessage) -> CommResult<()> {
        self.outbound.send(message).map_err(|_| CommError::ChannelClosed)
    }

    pub fn subscribe<L>(&self, listener: L) -> ListenerHandle
    where
        L: Fn(&TransportMessage) + Send + Sync + 'static,
    {
        self.listeners.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        self.listeners.unsubscribe(handle)
    }
}

impl FrameSink for RelayHandle {
    fn send_frame(&self, message: MavMessage) -> CommResult<()> {
        self.send(message)
    }
}

/// Link pump over an owned transport
pub struct TelemetryRelay<T: Transport> {
    transport: T,
    listeners: Arc<ListenerRegistry<MessageListener>>,
    outbound_tx: Sender<MavMessage>,
    outbound_rx: Receiver<MavMessage>,
    config: RelayConfig,
    last_heartbeat: Instant,
    forwarded: u64,
    heartbeats: u64,
}

impl<T: Transport> TelemetryRelay<T> {
    pub fn new(transport: T, config: RelayConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel();
        Self {
            transport,
            listeners: Arc::new(ListenerRegistry::new()),
            outbound_tx,
            outbound_rx,
            config,
            last_heartbeat: Instant::now(),
            forwarded: 0,
            heartbeats: 0,
        }
    }

    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            outbound: self.outbound_tx.clone(),
            listeners: Arc::clone(&self.listeners),
        }
    }

    /// Restart the heartbeat interval from `now`
    pub fn reset_heartbeat_timer(&mut self, now: Instant) {
        self.last_heartbeat = now;
    }

    /// Frames delivered to listeners so far
    pub fn forwarded_count(&self) -> u64 {
        self.forwarded
    }

    pub fn heartbeat_count(&self) -> u64 {
        self.heartbeats
    }

    /// One loop iteration at time `now`
    pub fn step(&mut self, now: Instant) -> CommResult<StepOutcome> {
        self.flush_outbound()?;

        if let Some(frame) = self.transport.try_recv()? {
            self.dispatch(&frame);
            return Ok(StepOutcome::Forwarded);
        }

        if now.saturating_duration_since(self.last_heartbeat) >= self.config.heartbeat_interval() {
            self.transport.send(&heartbeat_message())?;
            self.last_heartbeat = now;
            self.heartbeats += 1;
            trace!(count = self.heartbeats, "Heartbeat sent");
            return Ok(StepOutcome::Heartbeat);
        }

        Ok(StepOutcome::Idle)
    }

    fn flush_outbound(&mut self) -> CommResult<()> {
        while let Ok(message) = self.outbound_rx.try_recv() {
            match self.transport.send(&message) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(error = %e, "Dropping outbound frame"),
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, frame: &TransportMessage) {
        let listeners = self.listeners.snapshot();
        trace!(message = frame.type_tag(), listeners = listeners.len(), "Forwarding frame");
        for listener in listeners {
            listener(frame);
        }
        self.forwarded += 1;
    }
}

impl<T: Transport> MessageRelay for TelemetryRelay<T> {
    fn send(&mut self, message: &MavMessage) -> CommResult<()> {
        self.transport.send(message)
    }

    fn subscribe(&self, listener: Arc<MessageListener>) -> ListenerHandle {
        self.listeners.subscribe(listener)
    }

    fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        self.listeners.unsubscribe(handle)
    }

    fn run(&mut self, cancel: &CancelToken) -> CommResult<()> {
        info!(
            heartbeat_ms = self.config.heartbeat_interval_ms,
            listeners = self.listeners.len(),
            "Telemetry relay started"
        );
        self.reset_heartbeat_timer(Instant::now());

        while !cancel.is_cancelled() {
            match self.step(Instant::now()) {
                Ok(StepOutcome::Idle) => {
                    if !self.config.idle_poll().is_zero() && cancel.wait(self.config.idle_poll()) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Telemetry relay stopped");
                    return Err(e);
                }
                Err(e) => warn!(error = %e, "Telemetry relay error"),
            }
        }

        info!(forwarded = self.forwarded, heartbeats = self.heartbeats, "Telemetry relay cancelled");
        Ok(())
    }
}
