//! Telemetry relay and link-level helpers
//!
//! The relay owns the transport and runs on its own thread. Other components
//! reach the link through a [`RelayHandle`] or any [`FrameSink`].

pub mod relay;
pub mod loopback;
pub mod heartbeat;
pub mod status;

pub use relay::{
    FrameSink, MessageListener, MessageRelay, RelayConfig, RelayHandle, StepOutcome, TelemetryRelay,
};
pub use loopback::LoopbackRelay;
pub use heartbeat::heartbeat_message;
pub use status::{StatusSink, StatusTextSender};
