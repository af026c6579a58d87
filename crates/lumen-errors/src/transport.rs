//! Controller transport error types.
//!
//! These never reach the render loop or control-plane callers; the channel
//! worker logs them and retries on a freshly created socket.

use crate::common::ErrorSeverity;

/// Controller socket and network faults.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Host name could not be resolved
    #[error("Failed to resolve controller host {host}: {reason}")]
    Resolve {
        /// Host name
        host: String,
        /// Resolver message
        reason: String,
    },

    /// TCP connect failed
    #[error("Failed to connect to controller {host}: {source}")]
    Connect {
        /// Host name
        host: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Fewer bytes were written than requested
    #[error("Short write to controller {host}: sent {sent} of {expected} bytes")]
    ShortWrite {
        /// Host name
        host: String,
        /// Bytes written before the failure
        sent: usize,
        /// Bytes requested
        expected: usize,
    },

    /// Send attempted without a live connection
    #[error("Controller {0} is not connected")]
    NotConnected(String),

    /// The socket already failed and will not be retried
    #[error("Controller socket for {0} is dead")]
    Dead(String),

    /// Other socket I/O failure
    #[error("I/O error on controller {host}: {source}")]
    Io {
        /// Host name
        host: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TransportError::NotConnected(_) => ErrorSeverity::Info,
            TransportError::Dead(_) => ErrorSeverity::Warning,
            TransportError::Resolve { .. }
            | TransportError::Connect { .. }
            | TransportError::ShortWrite { .. }
            | TransportError::Io { .. } => ErrorSeverity::Error,
        }
    }

    /// Every transport fault is retried with a fresh socket; this reports
    /// whether the current socket instance can still be used.
    pub fn is_socket_fatal(&self) -> bool {
        !matches!(self, TransportError::NotConnected(_))
    }

    /// Create a dead-socket error.
    pub fn dead(host: impl Into<String>) -> Self {
        TransportError::Dead(host.into())
    }

    /// Wrap an I/O error for a host.
    pub fn io(host: impl Into<String>, source: std::io::Error) -> Self {
        TransportError::Io {
            host: host.into(),
            source,
        }
    }
}
