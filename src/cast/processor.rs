use crate::cast::flattener::JsonFlattener;
use crate::cast::sink::{CsvSink, SinkError};
use crate::cast::types::{CastConfig, ProcessSummary};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Message-level failures surfaced to the caller. The delivery layer
/// outside the core decides whether to skip or redeliver.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("payload is not well-formed JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("payload root is not a JSON object")]
    NotAnObject,
}

/// Processes one raw JSON message at a time: parse, split into scalar
/// fields and array groups, append each non-empty group to its CSV file.
///
/// Safe to share across concurrent dispatch threads; the sink serializes
/// same-group writes internally.
pub struct RecordProcessor {
    flattener: JsonFlattener,
    sink: CsvSink,
}

impl RecordProcessor {
    pub fn new(config: CastConfig) -> Result<Self, SinkError> {
        let sink = CsvSink::new(&config.output_dir)?;
        Ok(RecordProcessor {
            flattener: JsonFlattener::new(config.separator),
            sink,
        })
    }

    /// Entry point for one delivered message.
    ///
    /// Blank input and objects without array fields are no-ops, not errors.
    /// A write failure in one group is logged and counted but never blocks
    /// the remaining groups of the message.
    pub fn process_message(&self, raw: &str) -> Result<ProcessSummary, ProcessError> {
        if raw.trim().is_empty() {
            warn!("received empty message, skipping");
            return Ok(ProcessSummary::default());
        }

        let value: Value = serde_json::from_str(raw)?;
        let data = match value {
            Value::Object(map) => map,
            _ => return Err(ProcessError::NotAnObject),
        };

        let scalar_fields = self.flattener.scalar_fields(&data);
        let groups = self.flattener.array_groups(&data);

        if groups.is_empty() {
            info!("no array fields found in message, nothing to write");
            return Ok(ProcessSummary::default());
        }

        debug!(
            scalar_keys = ?scalar_fields.keys().collect::<Vec<_>>(),
            group_names = ?groups.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            "extracted message fields"
        );

        let mut summary = ProcessSummary::default();
        for group in &groups {
            if group.items.is_empty() {
                debug!(group = %group.name, "skipping empty array field");
                continue;
            }

            match self.sink.write_group(&group.name, &scalar_fields, &group.items) {
                Ok(rows) => {
                    summary.groups_written += 1;
                    summary.rows_written += rows;
                }
                Err(err) => {
                    error!(group = %group.name, error = %err, "failed to write group");
                    summary.failed_groups += 1;
                }
            }
        }

        Ok(summary)
    }

    /// The sink owning header state and output files
    pub fn sink(&self) -> &CsvSink {
        &self.sink
    }
}
