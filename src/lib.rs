//! # Ingot - JSON stream to CSV caster
//!
//! A library for casting JSON messages into per-array-field CSV files:
//! nested objects are flattened with an underscore separator, every
//! array-valued field becomes one CSV file, and the record-level scalar
//! fields are repeated on each row.
//!
//! ## Quick Start
//!
//! ```rust
//! use ingot::cast::{CastConfig, RecordProcessor};
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let config = CastConfig {
//!     output_dir: dir.path().to_path_buf(),
//!     ..CastConfig::default()
//! };
//!
//! let processor = RecordProcessor::new(config)?;
//! let summary = processor.process_message(
//!     r#"{"name":"Alice","posts":[{"id":10,"title":"First"},{"id":11,"title":"Second"}]}"#,
//! )?;
//!
//! // posts.csv now holds a header line plus two rows
//! assert_eq!(summary.rows_written, 2);
//! # Ok(())
//! # }
//! ```
//!
//! The processor is the per-message entry point an external stream consumer
//! calls; it owns no transport, offsets, or retry policy.

use anyhow::{Context, Result};
use std::io::BufRead;
use tracing::warn;

pub mod cast;

// Re-export commonly used types for convenience
pub use cast::{
    ArrayGroup, CastConfig, CsvSink, FlatRecord, JsonFlattener, ProcessError, ProcessSummary,
    RecordProcessor, SinkError,
};

/// Main entry point: cast a stream of newline-delimited JSON messages.
///
/// Blank lines are skipped; messages that fail to parse are logged and
/// skipped, matching at-least-once stream semantics where a poison message
/// must not halt the consumer. Read errors on the stream itself propagate.
pub fn process_stream<R: BufRead>(reader: R, processor: &RecordProcessor) -> Result<ProcessSummary> {
    let mut total = ProcessSummary::default();

    for line in reader.lines() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }

        match processor.process_message(&line) {
            Ok(summary) => total.merge(summary),
            Err(err) => warn!(error = %err, "skipping message"),
        }
    }

    Ok(total)
}
