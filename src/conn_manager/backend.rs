use async_trait::async_trait;

use crate::config::printer_config::{PrinterProtocol, PrinterTarget};
use crate::status::PrinterStatusReport;

use super::command::PrinterFileRecord;
use super::printer_error::PrinterError;

/// One protocol-specific implementation of the printer command surface.
///
/// Backends hold no per-target state between calls apart from connection
/// reuse, and never let a raw transport error escape: every failure comes
/// back as a [`PrinterError`].
#[async_trait]
pub trait ProtocolBackend: Send + Sync {
    fn protocol(&self) -> PrinterProtocol;

    /// Minimal reachability probe: one full protocol round trip against a
    /// fresh connection, nothing more. A well-formed-but-unexpected reply is
    /// a failure like any other.
    async fn handshake(&self, target: &PrinterTarget) -> Result<(), PrinterError>;

    async fn query_status(&self, target: &PrinterTarget)
        -> Result<PrinterStatusReport, PrinterError>;

    /// Unordered; callers sort. An empty printer yields an empty vec.
    async fn list_files(&self, target: &PrinterTarget)
        -> Result<Vec<PrinterFileRecord>, PrinterError>;

    async fn start_print(&self, target: &PrinterTarget, filename: &str)
        -> Result<(), PrinterError>;

    async fn delete_file(&self, target: &PrinterTarget, filename: &str)
        -> Result<(), PrinterError>;
}
