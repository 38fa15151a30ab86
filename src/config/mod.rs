pub mod printer_config;

pub use printer_config::{PrinterProtocol, PrinterTarget};
