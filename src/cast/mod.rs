//! JSON casting - flatten message payloads and pour array fields into
//! per-field CSV files.
//!
//! The flattener is pure computation; all file state (cached headers,
//! header-written flags, append handles) lives in the [`CsvSink`] and is
//! scoped to its lifetime rather than held globally.

pub mod types;
pub mod flattener;
pub mod sink;
pub mod processor;

pub use types::{ArrayGroup, CastConfig, FlatRecord, ProcessSummary};
pub use flattener::JsonFlattener;
pub use sink::{CsvSink, SinkError};
pub use processor::{ProcessError, RecordProcessor};
