use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::conn_manager::printer_error::PrinterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrinterProtocol {
    Act,
    Octoprint,
    AnycubicHttp,
}

/// getters
impl PrinterProtocol {
    pub fn default_port(&self) -> u16 {
        match self {
            PrinterProtocol::Act => 6000,
            PrinterProtocol::Octoprint => 80,
            PrinterProtocol::AnycubicHttp => 18910,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, PrinterProtocol::Octoprint)
    }

    pub fn to_text(&self) -> &'static str {
        match self {
            PrinterProtocol::Act => "ACT",
            PrinterProtocol::Octoprint => "OctoPrint",
            PrinterProtocol::AnycubicHttp => "Anycubic HTTP",
        }
    }
}

impl std::fmt::Display for PrinterProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// The address/port/protocol/credential tuple identifying one printer.
///
/// Built once per command from user-entered configuration; the client
/// re-validates before any I/O so a malformed target never reaches a socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterTarget {
    pub address: String,
    pub port: u16,
    pub protocol: PrinterProtocol,
    /// Required for OctoPrint, ignored by the other protocols.
    pub api_key: Option<String>,
}

impl PrinterTarget {
    pub fn new(
        address: impl Into<String>,
        port: u16,
        protocol: PrinterProtocol,
        api_key: Option<String>,
    ) -> Self {
        Self {
            address: address.into(),
            port,
            protocol,
            api_key,
        }
    }

    /// Boundary constructor for user-entered configuration strings.
    ///
    /// An empty port field takes the protocol default; an unparsable port or
    /// address is rejected outright instead of silently substituting a
    /// default that would point the command at the wrong endpoint.
    pub fn from_user_input(
        address: &str,
        port: &str,
        protocol: PrinterProtocol,
        api_key: Option<&str>,
    ) -> Result<Self, PrinterError> {
        let port = if port.trim().is_empty() {
            protocol.default_port()
        } else {
            port.trim().parse::<u16>().map_err(|_| {
                PrinterError::InvalidTarget(format!("port {:?} is not a number in 1-65535", port))
            })?
        };

        let target = Self::new(
            address.trim(),
            port,
            protocol,
            api_key.map(|k| k.to_string()),
        );
        target.validate()?;
        Ok(target)
    }

    pub fn validate(&self) -> Result<(), PrinterError> {
        if self.address.parse::<Ipv4Addr>().is_err() {
            return Err(PrinterError::InvalidTarget(format!(
                "address {:?} is not an IPv4 literal",
                self.address
            )));
        }
        if self.port == 0 {
            return Err(PrinterError::InvalidTarget(
                "port must be in 1-65535".to_string(),
            ));
        }
        if self.protocol.requires_api_key()
            && self.api_key.as_deref().map_or(true, |k| k.is_empty())
        {
            return Err(PrinterError::InvalidTarget(format!(
                "{} requires an API key",
                self.protocol.to_text()
            )));
        }
        Ok(())
    }

    pub fn host_port(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
