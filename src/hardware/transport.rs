//! Transport trait and link configuration

use crate::core::{DEFAULT_CONNECTION, GCS_COMPONENT_ID, GCS_SYSTEM_ID};
use crate::hardware::{CommError, CommResult, TransportMessage};
use mavlink::common::MavMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bidirectional frame link owned by a single relay
pub trait Transport: Send {
    /// Receive one frame without blocking.
    /// Returns Ok(None) when nothing is pending.
    fn try_recv(&mut self) -> CommResult<Option<TransportMessage>>;

    /// Write one frame; no acknowledgement is tracked
    fn send(&mut self, message: &MavMessage) -> CommResult<()>;

    fn is_connected(&self) -> bool;
}

/// Parsed `tcp:<host>:<port>` connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAddress {
    pub host: String,
    pub port: u16,
}

impl LinkAddress {
    /// Address in the scheme the mavlink crate connects with
    pub fn to_mavlink_url(&self) -> String {
        format!("tcpout:{}:{}", self.host, self.port)
    }
}

impl FromStr for LinkAddress {
    type Err = CommError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CommError::InvalidAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        let rest = s.strip_prefix("tcp:").ok_or_else(|| invalid("expected tcp:<host>:<port>"))?;
        let (host, port) = rest.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("port is not a number in 0-65535"))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp:{}:{}", self.host, self.port)
    }
}

/// Link parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Connection string, `tcp:<host>:<port>`
    pub connection: String,
    /// System id stamped on outgoing frames
    pub system_id: u8,
    /// Component id stamped on outgoing frames
    pub component_id: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connection: DEFAULT_CONNECTION.to_string(),
            system_id: GCS_SYSTEM_ID,
            component_id: GCS_COMPONENT_ID,
        }
    }
}

impl LinkConfig {
    pub fn with_connection(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            ..Self::default()
        }
    }

    pub fn address(&self) -> CommResult<LinkAddress> {
        self.connection.parse()
    }
}
