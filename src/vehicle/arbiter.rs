//! Single owner of vehicle mode transitions
//!
//! Mode requests from any thread are queued to one arbiter thread, which
//! issues them one at a time and watches vehicle state until the requested
//! mode is reported or the acknowledgement timeout runs out.

use crate::core::VehicleMode;
use crate::vehicle::{Vehicle, VehicleError, VehicleResult};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Arbiter timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    /// How long to wait for the vehicle to report a requested mode (ms)
    pub ack_timeout_ms: u64,
    /// State poll period while waiting (ms)
    pub poll_ms: u64,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 3000,
            poll_ms: 100,
        }
    }
}

impl ModeConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

/// Outcome of a mode request
#[derive(Debug, Clone, PartialEq)]
pub enum ModeAck {
    /// Vehicle reports the requested mode
    Confirmed,
    /// Vehicle still reports `observed` after the ack timeout
    TimedOut {
        requested: VehicleMode,
        observed: VehicleMode,
    },
    /// Command could not be issued
    Failed(String),
}

enum ArbiterMessage {
    Request {
        mode: VehicleMode,
        reply: Sender<ModeAck>,
    },
    Shutdown,
}

/// Pending mode request.
///
/// Dropping the ticket does not cancel the request.
pub struct ModeTicket {
    mode: VehicleMode,
    reply: Receiver<ModeAck>,
}

impl ModeTicket {
    pub fn requested_mode(&self) -> VehicleMode {
        self.mode
    }

    /// Block until the arbiter answers
    pub fn wait(self) -> ModeAck {
        self.reply
            .recv()
            .unwrap_or_else(|_| ModeAck::Failed("mode arbiter stopped".to_string()))
    }

    /// Block for at most `timeout`; `None` if the arbiter has not answered yet
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ModeAck> {
        match self.reply.recv_timeout(timeout) {
            Ok(ack) => Some(ack),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(ModeAck::Failed("mode arbiter stopped".to_string())),
        }
    }
}

/// Cloneable request side of the arbiter
#[derive(Clone)]
pub struct ModeClient {
    requests: Sender<ArbiterMessage>,
}

impl ModeClient {
    /// Queue a transition to `mode`
    pub fn request(&self, mode: VehicleMode) -> VehicleResult<ModeTicket> {
        let (reply, ticket) = mpsc::channel();
        self.requests
            .send(ArbiterMessage::Request { mode, reply })
            .map_err(|_| VehicleError::ArbiterStopped)?;
        Ok(ModeTicket { mode, reply: ticket })
    }
}

/// Arbiter thread; stops when dropped
pub struct ModeArbiter {
    client: ModeClient,
    worker: Option<JoinHandle<()>>,
}

impl ModeArbiter {
    pub fn spawn(vehicle: Arc<dyn Vehicle>, config: ModeConfig) -> VehicleResult<Self> {
        let (requests, inbox) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("mode-arbiter".to_string())
            .spawn(move || arbitrate(vehicle.as_ref(), &config, inbox))
            .map_err(|_| VehicleError::ArbiterStopped)?;

        Ok(Self {
            client: ModeClient { requests },
            worker: Some(worker),
        })
    }

    pub fn client(&self) -> ModeClient {
        self.client.clone()
    }
}

impl Drop for ModeArbiter {
    fn drop(&mut self) {
        let _ = self.client.requests.send(ArbiterMessage::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn arbitrate(vehicle: &dyn Vehicle, config: &ModeConfig, inbox: Receiver<ArbiterMessage>) {
    debug!("Mode arbiter started");
    while let Ok(message) = inbox.recv() {
        let (mode, reply) = match message {
            ArbiterMessage::Request { mode, reply } => (mode, reply),
            ArbiterMessage::Shutdown => break,
        };

        let ack = transition(vehicle, config, mode);
        match &ack {
            ModeAck::Confirmed => info!(mode = %mode, "Mode change confirmed"),
            ModeAck::TimedOut { observed, .. } => {
                warn!(mode = %mode, observed = %observed, "Mode change not confirmed")
            }
            ModeAck::Failed(reason) => warn!(mode = %mode, reason = %reason, "Mode change failed"),
        }
        let _ = reply.send(ack);
    }
    debug!("Mode arbiter stopped");
}

fn transition(vehicle: &dyn Vehicle, config: &ModeConfig, mode: VehicleMode) -> ModeAck {
    if let Err(e) = vehicle.command_mode(mode) {
        return ModeAck::Failed(e.to_string());
    }

    let deadline = Instant::now() + config.ack_timeout();
    loop {
        let observed = vehicle.state().mode;
        if observed == mode {
            return ModeAck::Confirmed;
        }
        if Instant::now() >= deadline {
            return ModeAck::TimedOut {
                requested: mode,
                observed,
            };
        }
        thread::sleep(config.poll_interval());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GeoPosition;
    use crate::vehicle::{SimConfig, SimVehicle};

    fn fast_config() -> ModeConfig {
        ModeConfig {
            ack_timeout_ms: 50,
            poll_ms: 1,
        }
    }

    fn sim(config: SimConfig) -> Arc<SimVehicle> {
        Arc::new(SimVehicle::new(GeoPosition::global_relative(0.0, 0.0, 0.0), config))
    }

    #[test]
    fn test_confirmed_after_vehicle_reports_mode() {
        let vehicle = sim(SimConfig {
            mode_latency_polls: 3,
            ..SimConfig::default()
        });
        let arbiter = ModeArbiter::spawn(vehicle.clone(), fast_config()).unwrap();

        let ticket = arbiter.client().request(VehicleMode::Land).unwrap();
        assert_eq!(ticket.requested_mode(), VehicleMode::Land);
        assert_eq!(ticket.wait(), ModeAck::Confirmed);
        assert_eq!(vehicle.peek().mode, VehicleMode::Land);
    }

    #[test]
    fn test_times_out_when_mode_never_changes() {
        let vehicle = sim(SimConfig::default());
        vehicle.set_ignore_mode_commands(true);
        let arbiter = ModeArbiter::spawn(vehicle, fast_config()).unwrap();

        let ack = arbiter.client().request(VehicleMode::Rtl).unwrap().wait();
        assert_eq!(
            ack,
            ModeAck::TimedOut {
                requested: VehicleMode::Rtl,
                observed: VehicleMode::Stabilize,
            }
        );
    }

    #[test]
    fn test_requests_are_serialized() {
        let vehicle = sim(SimConfig::default());
        let arbiter = ModeArbiter::spawn(vehicle.clone(), fast_config()).unwrap();
        let client = arbiter.client();

        let first = client.request(VehicleMode::Guided).unwrap();
        let second = client.request(VehicleMode::Rtl).unwrap();
        assert_eq!(first.wait(), ModeAck::Confirmed);
        assert_eq!(second.wait(), ModeAck::Confirmed);
        assert_eq!(vehicle.peek().mode, VehicleMode::Rtl);
    }

    #[test]
    fn test_client_fails_after_shutdown() {
        let vehicle = sim(SimConfig::default());
        let client = ModeArbiter::spawn(vehicle, fast_config()).unwrap().client();
        assert!(matches!(client.request(VehicleMode::Land), Err(VehicleError::ArbiterStopped)));
    }
}
