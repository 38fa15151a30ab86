use bytes::BytesMut;

use crate::conn_manager::printer_error::PrinterError;

/// Upper bound on a single response frame. A peer that streams more than
/// this without a terminator is broken or hostile; the buffer never grows
/// past it.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

const FRAME_END: &[u8] = b"end";

/// Requests are single ASCII lines: `verb[,arg],\n`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActRequest {
    GetStatus,
    GetFileList,
    StartPrint { filename: String },
    DeleteFile { filename: String },
}

impl ActRequest {
    pub fn verb(&self) -> &'static str {
        match self {
            ActRequest::GetStatus => "getstatus",
            ActRequest::GetFileList => "getfilelist",
            ActRequest::StartPrint { .. } => "print",
            ActRequest::DeleteFile { .. } => "delfile",
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            ActRequest::GetStatus => b"getstatus,\n".to_vec(),
            ActRequest::GetFileList => b"getfilelist,\n".to_vec(),
            ActRequest::StartPrint { filename } => format!("print,{},\n", filename).into_bytes(),
            ActRequest::DeleteFile { filename } => format!("delfile,{},\n", filename).into_bytes(),
        }
    }
}

/// One complete response frame: every line before the `end` terminator,
/// CR/LF stripped, blank lines dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ActFrame {
    pub lines: Vec<String>,
}

impl ActFrame {
    /// Verb of the first line, up to the first comma.
    pub fn verb(&self) -> Option<&str> {
        let first = self.lines.first()?;
        first.split(',').next()
    }

    /// Comma-separated fields of the first line.
    pub fn fields(&self) -> Vec<&str> {
        match self.lines.first() {
            Some(line) => line.split(',').collect(),
            None => vec![],
        }
    }
}

/// Incremental decode over the accumulation buffer. Returns `Ok(None)`
/// until the terminator line has arrived; once it has, the frame is
/// consumed from `buf`, leaving any pipelined bytes behind.
///
/// The transport may deliver a response in arbitrary chunks, so this is
/// called after every read.
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<ActFrame>, PrinterError> {
    let mut line_start = 0usize;
    for idx in 0..buf.len() {
        if buf[idx] != b'\n' {
            continue;
        }
        let mut line_end = idx;
        if line_end > line_start && buf[line_end - 1] == b'\r' {
            line_end -= 1;
        }
        if &buf[line_start..line_end] == FRAME_END {
            if idx + 1 > MAX_FRAME_BYTES {
                return Err(PrinterError::ProtocolError(format!(
                    "response frame exceeds {} bytes",
                    MAX_FRAME_BYTES
                )));
            }
            let frame = buf.split_to(idx + 1);
            let body = &frame[..line_start];
            let text = std::str::from_utf8(body).map_err(|_| {
                PrinterError::ProtocolError("response frame is not valid utf-8".to_string())
            })?;
            let lines = text
                .lines()
                .map(|l| l.trim_end_matches('\r').to_string())
                .filter(|l| !l.is_empty())
                .collect();
            return Ok(Some(ActFrame { lines }));
        }
        line_start = idx + 1;
    }

    if buf.len() > MAX_FRAME_BYTES {
        return Err(PrinterError::ProtocolError(format!(
            "response frame exceeds {} bytes without a terminator",
            MAX_FRAME_BYTES
        )));
    }
    Ok(None)
}
