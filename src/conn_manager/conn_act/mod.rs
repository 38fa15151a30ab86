pub mod act_codec;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::config::printer_config::{PrinterProtocol, PrinterTarget};
use crate::status::{PrinterState, PrinterStatusReport};

use super::backend::ProtocolBackend;
use super::command::PrinterFileRecord;
use super::conn_cache::{CacheKey, ConnCache};
use super::printer_error::PrinterError;

use act_codec::{decode_frame, ActFrame, ActRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    AwaitingResponse,
    Closed,
    Failed,
}

/// One TCP session with an ACT printer. Lifecycle:
/// `Disconnected -> Connecting -> Connected -> AwaitingResponse ->
/// (Connected | Closed | Failed)`. A failed session is never reused; the
/// socket closes when it drops.
pub(crate) struct ActSession {
    peer: String,
    stream: Option<TcpStream>,
    state: SessionState,
    buf: BytesMut,
}

impl ActSession {
    fn new(peer: String) -> Self {
        Self {
            peer,
            stream: None,
            state: SessionState::Disconnected,
            buf: BytesMut::with_capacity(4096),
        }
    }

    pub(crate) async fn open(target: &PrinterTarget) -> Result<Self, PrinterError> {
        let mut session = Self::new(target.host_port());
        session.connect().await?;
        Ok(session)
    }

    async fn connect(&mut self) -> Result<(), PrinterError> {
        self.state = SessionState::Connecting;
        trace!("connecting to {}", self.peer);
        match TcpStream::connect(&self.peer).await {
            Ok(stream) => {
                debug!("connected to {}", self.peer);
                self.stream = Some(stream);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(PrinterError::TransportFailure(format!(
                    "connect {}: {}",
                    self.peer, e
                )))
            }
        }
    }

    /// One request/response round trip. Reads until the codec finds a
    /// complete frame; partial chunks accumulate in `buf`.
    pub(crate) async fn request(&mut self, req: &ActRequest) -> Result<ActFrame, PrinterError> {
        let Some(stream) = self.stream.as_mut() else {
            self.state = SessionState::Failed;
            return Err(PrinterError::TransportFailure(format!(
                "no open connection to {}",
                self.peer
            )));
        };

        if let Err(e) = stream.write_all(&req.encode()).await {
            self.state = SessionState::Failed;
            return Err(PrinterError::TransportFailure(format!(
                "write {}: {}",
                self.peer, e
            )));
        }
        self.state = SessionState::AwaitingResponse;

        loop {
            match decode_frame(&mut self.buf) {
                Ok(Some(frame)) => {
                    self.state = SessionState::Connected;
                    return Ok(frame);
                }
                Ok(None) => {}
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
            }

            match stream.read_buf(&mut self.buf).await {
                Ok(0) => {
                    self.state = SessionState::Failed;
                    return Err(PrinterError::TransportFailure(format!(
                        "{} closed the connection mid-response",
                        self.peer
                    )));
                }
                Ok(_) => {}
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(PrinterError::TransportFailure(format!(
                        "read {}: {}",
                        self.peer, e
                    )));
                }
            }
        }
    }

    async fn close(mut self) {
        self.state = SessionState::Closed;
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        trace!("closed connection to {}", self.peer);
    }

    fn is_reusable(&self) -> bool {
        self.state == SessionState::Connected && self.stream.is_some()
    }
}

/// Backend for the proprietary ACT control protocol spoken over a raw TCP
/// socket, default port 6000.
pub struct ActClient {
    cache: ConnCache,
}

impl ActClient {
    const IDLE_TTL: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self {
            cache: ConnCache::new(Self::IDLE_TTL),
        }
    }

    /// The wire delimiters cannot appear in a filename argument.
    fn check_filename(filename: &str) -> Result<(), PrinterError> {
        if filename.contains(',') || filename.contains('\r') || filename.contains('\n') {
            return Err(PrinterError::InvalidTarget(format!(
                "filename {:?} contains ACT delimiter characters",
                filename
            )));
        }
        Ok(())
    }

    /// Run one command, reusing a cached session when one exists. A session
    /// that errored is dropped (socket closed) and never re-cached.
    async fn exec(
        &self,
        target: &PrinterTarget,
        req: ActRequest,
    ) -> Result<ActFrame, PrinterError> {
        let key = CacheKey::for_target(target);
        let mut session = match self.cache.take(&key) {
            Some(s) => {
                trace!("reusing cached connection to {}", target.host_port());
                s
            }
            None => ActSession::open(target).await?,
        };

        let frame = session.request(&req).await?;
        if frame.verb() != Some(req.verb()) {
            return Err(PrinterError::ProtocolError(format!(
                "expected a {} reply, got {:?}",
                req.verb(),
                frame.lines.first().map(String::as_str).unwrap_or("")
            )));
        }

        if session.is_reusable() {
            self.cache.put(key, session);
        }
        Ok(frame)
    }

    #[cfg(test)]
    fn cached_sessions(&self) -> usize {
        self.cache.len()
    }
}

fn parse_status(frame: &ActFrame) -> Result<PrinterStatusReport, PrinterError> {
    let fields = frame.fields();
    let state = match fields.get(1) {
        Some(&"free") => PrinterState::Idle,
        Some(&"print") => PrinterState::Printing,
        Some(&"pause") => PrinterState::Paused,
        Some(&"error") => PrinterState::Error,
        Some(other) => PrinterState::Unknown((*other).to_string()),
        None => {
            return Err(PrinterError::ProtocolError(
                "status reply carries no state field".to_string(),
            ))
        }
    };
    let current_file = fields
        .get(2)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    let progress = fields.get(3).and_then(|s| s.parse::<f32>().ok());

    Ok(PrinterStatusReport {
        state,
        model: None,
        current_file,
        progress,
    })
}

/// Listing entries are one `name/size` line per file after the `begin`
/// header; the size half is optional and tolerated missing or unparsable.
fn parse_file_list(frame: &ActFrame) -> Result<Vec<PrinterFileRecord>, PrinterError> {
    let mut lines = frame.lines.iter();
    lines.next().ok_or_else(|| {
        PrinterError::ProtocolError("file list reply carries no header line".to_string())
    })?;

    let mut out = Vec::new();
    for line in lines {
        let (name, size) = match line.rsplit_once('/') {
            Some((name, size)) => (name.to_string(), size.parse::<u64>().ok()),
            None => (line.clone(), None),
        };
        if name.is_empty() {
            continue;
        }
        out.push(PrinterFileRecord {
            filename: name,
            size,
            modified: None,
        });
    }
    Ok(out)
}

/// Ack replies are `verb,ok` or `verb,error,<detail>`.
fn check_ack(frame: &ActFrame, command: &str, filename: &str) -> Result<(), PrinterError> {
    let fields = frame.fields();
    match fields.get(1) {
        Some(&"ok") => Ok(()),
        Some(&"error") => match fields.get(2) {
            Some(&"nofile") => Err(PrinterError::NotFound(filename.to_string())),
            Some(&"busy") => Err(PrinterError::DeviceBusy),
            Some(&"disabled") => Err(PrinterError::Unsupported {
                protocol: PrinterProtocol::Act,
                command: command.to_string(),
            }),
            other => Err(PrinterError::ProtocolError(format!(
                "unrecognized error detail {:?}",
                other
            ))),
        },
        other => Err(PrinterError::ProtocolError(format!(
            "unexpected reply field {:?}",
            other
        ))),
    }
}

#[async_trait]
impl ProtocolBackend for ActClient {
    fn protocol(&self) -> PrinterProtocol {
        PrinterProtocol::Act
    }

    async fn handshake(&self, target: &PrinterTarget) -> Result<(), PrinterError> {
        // fresh socket, never the cache: connect, one status query, close
        let mut session = ActSession::open(target).await?;
        let result = session.request(&ActRequest::GetStatus).await;
        session.close().await;

        let frame = result?;
        if frame.verb() != Some("getstatus") {
            return Err(PrinterError::ProtocolError(format!(
                "expected a getstatus reply, got {:?}",
                frame.lines.first().map(String::as_str).unwrap_or("")
            )));
        }
        parse_status(&frame).map(|_| ())
    }

    async fn query_status(
        &self,
        target: &PrinterTarget,
    ) -> Result<PrinterStatusReport, PrinterError> {
        let frame = self.exec(target, ActRequest::GetStatus).await?;
        parse_status(&frame)
    }

    async fn list_files(
        &self,
        target: &PrinterTarget,
    ) -> Result<Vec<PrinterFileRecord>, PrinterError> {
        let frame = self.exec(target, ActRequest::GetFileList).await?;
        parse_file_list(&frame)
    }

    async fn start_print(
        &self,
        target: &PrinterTarget,
        filename: &str,
    ) -> Result<(), PrinterError> {
        Self::check_filename(filename)?;
        let frame = self
            .exec(
                target,
                ActRequest::StartPrint {
                    filename: filename.to_string(),
                },
            )
            .await?;
        check_ack(&frame, "start_print", filename)
    }

    async fn delete_file(
        &self,
        target: &PrinterTarget,
        filename: &str,
    ) -> Result<(), PrinterError> {
        Self::check_filename(filename)?;
        let frame = self
            .exec(
                target,
                ActRequest::DeleteFile {
                    filename: filename.to_string(),
                },
            )
            .await?;
        check_ack(&frame, "delete_file", filename)
    }
}
