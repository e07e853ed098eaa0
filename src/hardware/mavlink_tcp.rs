//! MAVLink over TCP
//!
//! `mavlink::connect` hands back a blocking connection. A reader thread pulls
//! frames off it into a channel so [`Transport::try_recv`] never blocks;
//! writes go straight to the socket from the owning thread.

use crate::hardware::{CommError, CommResult, LinkAddress, LinkConfig, Transport, TransportMessage};
use mavlink::common::MavMessage;
use mavlink::error::MessageReadError;
use mavlink::{MavConnection, MavHeader};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, trace, warn};

type Connection = Arc<dyn MavConnection<MavMessage> + Sync + Send>;

enum ReaderEvent {
    Frame(TransportMessage),
    Closed(String),
}

/// TCP client link to an autopilot or SITL instance
pub struct MavlinkTransport {
    address: LinkAddress,
    connection: Connection,
    inbound: Receiver<ReaderEvent>,
    system_id: u8,
    component_id: u8,
    sequence: u8,
    connected: bool,
}

impl MavlinkTransport {
    /// Connect to `config.connection`.
    ///
    /// Fails with [`CommError::TransportUnavailable`] when nothing listens
    /// at the address.
    pub fn connect(config: &LinkConfig) -> CommResult<Self> {
        let address = config.address()?;
        let connection: Connection = mavlink::connect::<MavMessage>(&address.to_mavlink_url())
            .map(Arc::from)
            .map_err(|e| CommError::TransportUnavailable {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        info!(address = %address, system_id = config.system_id, "MAVLink link connected");

        let (tx, inbound) = mpsc::channel();
        let reader = Arc::clone(&connection);
        let reader_address = address.to_string();
        thread::Builder::new()
            .name("mavlink-reader".to_string())
            .spawn(move || loop {
                match reader.recv() {
                    Ok((header, message)) => {
                        if tx.send(ReaderEvent::Frame(TransportMessage::new(header, message))).is_err() {
                            break;
                        }
                    }
                    Err(MessageReadError::Io(e)) => {
                        debug!(address = %reader_address, error = %e, "MAVLink reader stopped");
                        let _ = tx.send(ReaderEvent::Closed(e.to_string()));
                        break;
                    }
                    Err(e) => {
                        trace!(error = ?e, "Dropping unparseable MAVLink frame");
                    }
                }
            })
            .map_err(|e| CommError::TransportUnavailable {
                address: address.to_string(),
                reason: format!("reader thread: {e}"),
            })?;

        Ok(Self {
            address,
            connection,
            inbound,
            system_id: config.system_id,
            component_id: config.component_id,
            sequence: 0,
            connected: true,
        })
    }

    pub fn address(&self) -> &LinkAddress {
        &self.address
    }

    fn lost(&mut self) -> CommError {
        self.connected = false;
        CommError::ConnectionLost {
            address: self.address.to_string(),
        }
    }
}

impl Transport for MavlinkTransport {
    fn try_recv(&mut self) -> CommResult<Option<TransportMessage>> {
        if !self.connected {
            return Err(self.lost());
        }

        match self.inbound.try_recv() {
            Ok(ReaderEvent::Frame(frame)) => Ok(Some(frame)),
            Ok(ReaderEvent::Closed(reason)) => {
                warn!(address = %self.address, reason = %reason, "MAVLink link closed");
                Err(self.lost())
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.lost()),
        }
    }

    fn send(&mut self, message: &MavMessage) -> CommResult<()> {
        if !self.connected {
            return Err(self.lost());
        }

        let header = MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);

        self.connection
            .send(&header, message)
            .map(|_| ())
            .map_err(|e| CommError::SendFailed {
                details: format!("{e:?}"),
            })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::heartbeat::heartbeat_message;
    use std::io::Write;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    #[test]
    fn test_refused_connection_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = LinkConfig::with_connection(format!("tcp:127.0.0.1:{port}"));
        assert!(matches!(
            MavlinkTransport::connect(&config),
            Err(CommError::TransportUnavailable { .. })
        ));
    }

    #[test]
    fn test_malformed_connection_is_rejected() {
        let config = LinkConfig::with_connection("serial:/dev/ttyUSB0");
        assert!(matches!(
            MavlinkTransport::connect(&config),
            Err(CommError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_receives_frame_from_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let header = MavHeader {
                system_id: 1,
                component_id: 1,
                sequence: 7,
            };
            mavlink::write_v2_msg(&mut stream, header, &heartbeat_message()).unwrap();
            stream.flush().unwrap();
            thread::sleep(Duration::from_millis(500));
        });

        let config = LinkConfig::with_connection(format!("tcp:127.0.0.1:{port}"));
        let mut transport = MavlinkTransport::connect(&config).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let frame = loop {
            if let Some(frame) = transport.try_recv().unwrap() {
                break frame;
            }
            assert!(Instant::now() < deadline, "no frame received");
            thread::sleep(Duration::from_millis(10));
        };

        assert_eq!(frame.type_tag(), "HEARTBEAT");
        assert_eq!(frame.header.system_id, 1);
        peer.join().unwrap();
    }
}
