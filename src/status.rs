use serde::{Deserialize, Serialize};

/// Printer activity as reported by a status query, normalized across
/// protocols.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrinterState {
    Idle,
    Busy,
    Printing,
    Paused,
    Error,
    Unknown(String),
}

impl Default for PrinterState {
    fn default() -> Self {
        PrinterState::Idle
    }
}

impl PrinterState {
    pub fn to_text(&self) -> &'static str {
        match self {
            PrinterState::Idle => "Idle",
            PrinterState::Busy => "Busy",
            PrinterState::Printing => "Printing",
            PrinterState::Paused => "Paused",
            PrinterState::Error => "Error",
            PrinterState::Unknown(_) => "Unknown",
        }
    }
}

/// Snapshot of one printer at the moment of a status query. Everything
/// beyond the state itself is best-effort; firmwares differ in what they
/// report.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterStatusReport {
    pub state: PrinterState,
    pub model: Option<String>,
    pub current_file: Option<String>,
    /// 0.0 - 100.0
    pub progress: Option<f32>,
}
