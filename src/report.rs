//! Paged, filterable report views over the server search endpoints.

pub mod debounce;
pub mod export;
pub mod query;
pub mod runner;
pub mod sequencer;

pub use debounce::{DEFAULT_DEBOUNCE, Debouncer};
pub use export::{ExportBackend, ExportError, ExportFile, ExportFormat, ExportSource, export_report};
pub use query::{QueryError, ReportQuery, SearchRequest, SortDirection};
pub use runner::{ReportRunner, ReportState, SearchBackend};
pub use sequencer::{SearchSequencer, Ticket};
