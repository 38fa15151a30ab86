pub mod config;
pub mod conn_manager;
pub mod logging;
pub mod status;

pub use config::printer_config::{PrinterProtocol, PrinterTarget};
pub use conn_manager::command::{
    CommandResult, ConnectionTestResult, PrinterCommand, PrinterFileRecord,
};
pub use conn_manager::printer_error::PrinterError;
pub use conn_manager::{ClientPolicy, PrinterClient};
pub use status::{PrinterState, PrinterStatusReport};
