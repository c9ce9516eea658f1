// Workbook I/O operations

pub mod annotate;
pub mod error;
pub mod sheet;

pub use annotate::apply_fills;
pub use error::WorkbookError;
pub use sheet::load_input;
