use std::time::Duration;

use thiserror::Error;

use crate::config::printer_config::PrinterProtocol;

/// Unified failure taxonomy surfaced by every printer command.
///
/// Backends translate every transport and application failure into exactly
/// one of these before returning; no `std::io::Error`, `reqwest::Error` or
/// serde error crosses the API boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrinterError {
    /// Malformed address/port, missing required API key, or an unusable
    /// filename. Detected before any I/O.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The protocol does not implement the requested command, or no backend
    /// is registered for it.
    #[error("command {command} not supported for protocol {protocol}")]
    Unsupported {
        protocol: PrinterProtocol,
        command: String,
    },

    #[error("command did not complete within {0:?}")]
    Timeout(Duration),

    /// Connection refused/reset, socket error, HTTP 5xx. The only class
    /// eligible for the client's single silent retry.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("printer requires an API key")]
    AuthRequired,

    #[error("printer rejected the API key")]
    AuthRejected,

    #[error("no such file on printer: {0}")]
    NotFound(String),

    #[error("printer is busy with an active job")]
    DeviceBusy,

    /// Malformed or unexpected response: corrupt frame, invalid JSON,
    /// a reply to the wrong verb.
    #[error("protocol error: {0}")]
    ProtocolError(String),
}

impl PrinterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PrinterError::TransportFailure(_))
    }
}
