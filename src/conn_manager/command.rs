use serde::{Deserialize, Serialize};

use crate::status::PrinterStatusReport;

use super::printer_error::PrinterError;

/// One file as reported by a printer's storage listing. Identity is the
/// filename, unique within a single listing; nothing here is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterFileRecord {
    pub filename: String,
    pub size: Option<u64>,
    pub modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// The command surface, enum form. `PrinterClient::send_command` dispatches
/// these to the typed methods.
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterCommand {
    TestConnection,
    ListFiles,
    StartPrint { filename: String },
    DeleteFile { filename: String },
    QueryStatus,
}

impl PrinterCommand {
    pub fn to_text(&self) -> &'static str {
        match self {
            PrinterCommand::TestConnection => "test_connection",
            PrinterCommand::ListFiles => "list_files",
            PrinterCommand::StartPrint { .. } => "start_print",
            PrinterCommand::DeleteFile { .. } => "delete_file",
            PrinterCommand::QueryStatus => "query_status",
        }
    }
}

/// Outcome of a reachability probe. An unreachable printer is data here,
/// not an error; the underlying failure rides along for diagnostic display.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionTestResult {
    pub reachable: bool,
    pub error: Option<PrinterError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    ConnectionTest(ConnectionTestResult),
    FileListing(Vec<PrinterFileRecord>),
    PrintStarted,
    FileDeleted,
    Status(PrinterStatusReport),
}
