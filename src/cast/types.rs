use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// A flattened record - underscore-joined key paths mapped to their values.
///
/// Key order is first-seen order during flattening (the crate enables
/// serde_json's `preserve_order` feature), which is what makes header
/// derivation deterministic.
pub type FlatRecord = Map<String, Value>;

/// The rows extracted from one array-valued JSON field.
///
/// `name` is the underscore-joined path from the root to the array,
/// e.g. `"employees"` or `"company_departments"`. One `ArrayGroup`
/// becomes one CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayGroup {
    pub name: String,
    pub items: Vec<FlatRecord>,
}

impl ArrayGroup {
    pub fn new(name: impl Into<String>, items: Vec<FlatRecord>) -> Self {
        ArrayGroup {
            name: name.into(),
            items,
        }
    }
}

/// Configuration for the casting process
#[derive(Debug, Clone)]
pub struct CastConfig {
    /// Directory where CSV files are written
    pub output_dir: PathBuf,

    /// Separator joining nested key paths and group names
    pub separator: String,
}

impl Default for CastConfig {
    fn default() -> Self {
        CastConfig {
            output_dir: PathBuf::from("output"),
            separator: String::from("_"),
        }
    }
}

/// Counts reported back to the caller after processing messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    /// Array groups successfully appended to their CSV files
    pub groups_written: usize,

    /// Total data rows appended across all groups
    pub rows_written: usize,

    /// Groups that hit a write error (logged, not fatal)
    pub failed_groups: usize,
}

impl ProcessSummary {
    /// Fold another summary into this one
    pub fn merge(&mut self, other: ProcessSummary) {
        self.groups_written += other.groups_written;
        self.rows_written += other.rows_written;
        self.failed_groups += other.failed_groups;
    }
}
