use serde::{Deserialize, Serialize};

/// Vendor result codes carried in the RPC envelope.
pub const CODE_OK: i64 = 0;
pub const CODE_NO_FILE: i64 = 20002;
pub const CODE_BUSY: i64 = 20003;
pub const CODE_NOT_ALLOWED: i64 = 20004;

/// MARK: RPC envelope
/// Every command is a POST of this body to the single command endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CmdRequest<'a> {
    pub cmd: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CmdEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// MARK: query_state
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    pub model: Option<String>,
    pub state: String,
    pub file: Option<String>,
    pub progress: Option<f32>,
}

/// MARK: get_files
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileListData {
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: Option<u64>,
    /// unix seconds
    pub mtime: Option<i64>,
}

/// Ack replies carry no payload.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Empty {}
