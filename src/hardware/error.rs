//! Link error types

/// Errors raised by transports and the relay that owns them
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommError {
    /// Connection could not be established
    #[error("Transport unavailable at {address}: {reason}")]
    TransportUnavailable { address: String, reason: String },
    /// Connection string is not of the form `tcp:<host>:<port>`
    #[error("Invalid link address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    /// Established connection dropped
    #[error("Connection lost to {address}")]
    ConnectionLost { address: String },
    /// Frame could not be written
    #[error("Send failed: {details}")]
    SendFailed { details: String },
    /// Relay loop is gone; queued frames can no longer be delivered
    #[error("Relay channel closed")]
    ChannelClosed,
    /// Operation not offered by this implementation
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },
}

/// Result type for link operations
pub type CommResult<T> = Result<T, CommError>;

impl CommError {
    /// Whether the relay loop should stop on this error.
    ///
    /// There is no retry policy: a fatal error ends the loop, anything else is
    /// logged and the loop carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CommError::TransportUnavailable { .. }
                | CommError::ConnectionLost { .. }
                | CommError::ChannelClosed
                | CommError::Unsupported { .. }
        )
    }
}
