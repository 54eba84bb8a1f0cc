use crate::cast::types::FlatRecord;
use dashmap::DashMap;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Errors from a single group's file, never fatal to the sink as a whole
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-group cached state, guarded by that group's mutex
#[derive(Default)]
struct GroupState {
    /// Derived on first write and frozen for the lifetime of the sink
    headers: Option<Vec<String>>,
    header_written: bool,
    file: Option<File>,
}

/// Appends row groups to one CSV file per group name.
///
/// Headers are derived lazily on the first write for a group (scalar-field
/// keys first, then the first item's remaining keys) and never change
/// afterwards: later items missing a header render as empty cells, keys
/// outside the header are dropped.
///
/// Writers for the same group are serialized through a per-group mutex;
/// writers for distinct groups proceed independently. The group map uses
/// dashmap's entry API so first use derives the header exactly once even
/// under concurrent callers.
pub struct CsvSink {
    output_dir: PathBuf,
    groups: DashMap<String, Arc<Mutex<GroupState>>>,
}

impl CsvSink {
    /// Create a sink writing under `output_dir`, creating the directory
    /// if needed.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|source| SinkError::CreateDir {
            path: output_dir.clone(),
            source,
        })?;

        Ok(CsvSink {
            output_dir,
            groups: DashMap::new(),
        })
    }

    /// Path of the CSV file backing a group
    pub fn output_path(&self, group_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.csv", group_name))
    }

    /// Append one row per item to the group's CSV file, writing the header
    /// line first if this is the group's first write. Returns the number of
    /// rows appended.
    pub fn write_group(
        &self,
        group_name: &str,
        scalar_fields: &FlatRecord,
        items: &[FlatRecord],
    ) -> Result<usize, SinkError> {
        if items.is_empty() {
            return Ok(0);
        }

        let state = self
            .groups
            .entry(group_name.to_string())
            .or_default()
            .clone();
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.output_path(group_name);
        let GroupState {
            headers,
            header_written,
            file,
        } = &mut *state;

        let headers = headers.get_or_insert_with(|| {
            let derived = derive_headers(scalar_fields, &items[0]);
            debug!(group = group_name, headers = ?derived, "derived headers");
            derived
        });

        if file.is_none() {
            let opened = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| SinkError::Open {
                    path: path.clone(),
                    source,
                })?;
            *file = Some(opened);
        }
        let file = file.as_mut().ok_or_else(|| SinkError::Open {
            path: path.clone(),
            source: std::io::Error::other("file handle missing"),
        })?;

        if !*header_written {
            let line: Vec<String> = headers.iter().map(|h| escape_field(h)).collect();
            write_line(file, &path, &line.join(","))?;
            *header_written = true;
        }

        for item in items {
            let row: Vec<String> = headers
                .iter()
                .map(|header| {
                    let value = scalar_fields.get(header).or_else(|| item.get(header));
                    format_field(value)
                })
                .collect();
            write_line(file, &path, &row.join(","))?;
        }

        Ok(items.len())
    }

    /// Drop all cached headers, flags, and file handles. The next write for
    /// any group derives headers afresh and appends a new header line.
    pub fn reset(&self) {
        self.groups.clear();
    }
}

/// Scalar-field keys first, then the first item's unseen keys, deduplicated
fn derive_headers(scalar_fields: &FlatRecord, first_item: &FlatRecord) -> Vec<String> {
    let mut headers: Vec<String> = scalar_fields.keys().cloned().collect();
    for key in first_item.keys() {
        if !headers.iter().any(|h| h == key) {
            headers.push(key.clone());
        }
    }
    headers
}

fn write_line(file: &mut File, path: &Path, line: &str) -> Result<(), SinkError> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');
    file.write_all(&bytes).map_err(|source| SinkError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Canonical string form of a cell value: null and absent render empty,
/// residual non-scalar leaves render as compact JSON.
fn format_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => escape_field(s),
        Some(Value::Bool(b)) => escape_field(&b.to_string()),
        Some(Value::Number(n)) => escape_field(&n.to_string()),
        Some(other) => escape_field(&other.to_string()),
    }
}

/// RFC4180-style quoting: wrap and double internal quotes when the field
/// contains a comma, a double quote, or a line terminator
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
