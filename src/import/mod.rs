//! CSV unit-import reconciliation core.
//!
//! The importer reads Spanish-labeled CSV rows, maps each one to a unit
//! candidate, and applies them against storage one row at a time. Row
//! failures are collected and never abort the batch; partial success is
//! the intended outcome.

pub mod export;
pub mod reconcile;
pub mod row;
pub mod store;

pub use export::{write_units_csv, ExportRow, EXPORT_COLUMNS};
pub use reconcile::{run_import, BatchResult, ImportOptions, RowAction, RowFailure};
pub use row::{map_row, parse_rows, InputRow, UnitCandidate};
pub use store::{ImportStore, PgImportStore, StoreError};
