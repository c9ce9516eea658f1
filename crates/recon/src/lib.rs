//! `bomcheck-recon` — Indent-hierarchy BOM reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded sheet grids, returns classified
//! results and the cell annotations to apply. No CLI or workbook I/O.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod levels;
pub mod model;
pub mod qty;
pub mod reconcile;
pub mod reference;

pub use config::CheckConfig;
pub use engine::run;
pub use error::CheckError;
pub use model::{CellFill, CheckInput, CheckResult, PartKey, SheetGrid, Verdict};
