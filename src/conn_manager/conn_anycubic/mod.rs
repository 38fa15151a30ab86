pub mod anycubic_types;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::printer_config::{PrinterProtocol, PrinterTarget};
use crate::status::{PrinterState, PrinterStatusReport};

use super::backend::ProtocolBackend;
use super::command::PrinterFileRecord;
use super::printer_error::PrinterError;

use anycubic_types::{
    CmdEnvelope, CmdRequest, Empty, FileListData, StateData, CODE_BUSY, CODE_NOT_ALLOWED,
    CODE_NO_FILE, CODE_OK,
};

/// Backend for the Anycubic vendor HTTP protocol, default port 18910.
///
/// Deliberately unshared with the OctoPrint backend: one RPC endpoint, an
/// envelope with vendor result codes, no authentication. The two protocols
/// only look alike from the transport down.
pub struct AnycubicClient {
    client: reqwest::Client,
}

impl AnycubicClient {
    const URL_CMD: &'static str = "api/cmd";

    const CMD_STATE: &'static str = "query_state";
    const CMD_FILES: &'static str = "get_files";
    const CMD_PRINT: &'static str = "start_print";
    const CMD_DELETE: &'static str = "delete_file";

    pub fn new() -> Result<Self, PrinterError> {
        let client = reqwest::ClientBuilder::new()
            .build()
            .map_err(|e| PrinterError::TransportFailure(e.to_string()))?;
        Ok(Self { client })
    }

    /// One RPC round trip: POST the envelope, map HTTP status class, then
    /// map the vendor result code.
    async fn call<T: DeserializeOwned>(
        &self,
        target: &PrinterTarget,
        cmd: &str,
        file: Option<&str>,
    ) -> Result<Option<T>, PrinterError> {
        let url = format!("http://{}:{}/{}", target.address, target.port, Self::URL_CMD);
        let req = CmdRequest { cmd, file };

        debug!("sending command: {:?}", req);

        let res = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| PrinterError::TransportFailure(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            warn!("status {:#?}", status);
            return Err(map_status(status, file));
        }

        let envelope: CmdEnvelope<T> = res.json().await.map_err(|e| {
            PrinterError::ProtocolError(format!("invalid json from {}: {}", url, e))
        })?;

        match envelope.code {
            CODE_OK => Ok(envelope.data),
            CODE_NO_FILE => Err(PrinterError::NotFound(
                file.unwrap_or("(unknown)").to_string(),
            )),
            CODE_BUSY => Err(PrinterError::DeviceBusy),
            CODE_NOT_ALLOWED => Err(PrinterError::Unsupported {
                protocol: PrinterProtocol::AnycubicHttp,
                command: cmd.to_string(),
            }),
            code => Err(PrinterError::ProtocolError(format!(
                "device rejected {}: code {} ({})",
                cmd, code, envelope.msg
            ))),
        }
    }

    async fn state(&self, target: &PrinterTarget) -> Result<StateData, PrinterError> {
        self.call::<StateData>(target, Self::CMD_STATE, None)
            .await?
            .ok_or_else(|| {
                PrinterError::ProtocolError("query_state reply carries no data".to_string())
            })
    }
}

fn map_status(status: StatusCode, file: Option<&str>) -> PrinterError {
    match status.as_u16() {
        404 => PrinterError::NotFound(file.unwrap_or("(endpoint)").to_string()),
        409 => PrinterError::DeviceBusy,
        500..=599 => PrinterError::TransportFailure(format!("server error {}", status)),
        _ => PrinterError::ProtocolError(format!("unexpected status {}", status)),
    }
}

fn map_state(state: &str) -> PrinterState {
    match state {
        "free" => PrinterState::Idle,
        "busy" => PrinterState::Busy,
        "print" => PrinterState::Printing,
        "pause" => PrinterState::Paused,
        "error" => PrinterState::Error,
        other => PrinterState::Unknown(other.to_string()),
    }
}

#[async_trait]
impl ProtocolBackend for AnycubicClient {
    fn protocol(&self) -> PrinterProtocol {
        PrinterProtocol::AnycubicHttp
    }

    async fn handshake(&self, target: &PrinterTarget) -> Result<(), PrinterError> {
        let state = self.state(target).await?;
        debug!(
            "anycubic {} answered, state = {}",
            state.model.as_deref().unwrap_or("(unknown model)"),
            state.state
        );
        Ok(())
    }

    async fn query_status(
        &self,
        target: &PrinterTarget,
    ) -> Result<PrinterStatusReport, PrinterError> {
        let state = self.state(target).await?;
        Ok(PrinterStatusReport {
            state: map_state(&state.state),
            model: state.model,
            current_file: state.file,
            progress: state.progress,
        })
    }

    async fn list_files(
        &self,
        target: &PrinterTarget,
    ) -> Result<Vec<PrinterFileRecord>, PrinterError> {
        let listing = self
            .call::<FileListData>(target, Self::CMD_FILES, None)
            .await?
            .unwrap_or_default();

        Ok(listing
            .files
            .into_iter()
            .map(|f| PrinterFileRecord {
                filename: f.name,
                size: f.size,
                modified: f
                    .mtime
                    .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0)),
            })
            .collect())
    }

    async fn start_print(
        &self,
        target: &PrinterTarget,
        filename: &str,
    ) -> Result<(), PrinterError> {
        self.call::<Empty>(target, Self::CMD_PRINT, Some(filename))
            .await?;
        Ok(())
    }

    async fn delete_file(
        &self,
        target: &PrinterTarget,
        filename: &str,
    ) -> Result<(), PrinterError> {
        self.call::<Empty>(target, Self::CMD_DELETE, Some(filename))
            .await?;
        Ok(())
    }
}
