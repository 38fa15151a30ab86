use serde::{Deserialize, Serialize};

/// MARK: Version
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiVersion {
    pub api: String,
    pub server: String,
    #[serde(default)]
    pub text: String,
}

/// MARK: Files
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<FileEntry>,
    pub free: Option<u64>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub display: Option<String>,
    pub origin: Option<String>,
    pub size: Option<u64>,
    /// unix seconds
    pub date: Option<i64>,
}

/// MARK: Printer state
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterStatus {
    pub state: StateInfo,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateInfo {
    #[serde(default)]
    pub text: String,
    pub flags: StateFlags,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFlags {
    #[serde(default)]
    pub operational: bool,
    #[serde(default)]
    pub printing: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub error: bool,
}
