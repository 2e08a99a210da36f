//! Snapshot serialization and hand-off to an artifact sink.
//!
//! # Architecture
//!
//! - [`SnapshotExporter`] - renders the joined rows as CSV and uploads them
//! - [`ArtifactSink`] - storage capability injected into the exporter
//! - [`LocalDirectorySink`] / [`GcsSink`] - filesystem and Cloud Storage sinks
//! - [`mock::MemorySink`] - in-memory sink (behind `test-utils` feature)

mod gcs;
mod sink;

pub use gcs::{GcsSink, GCS_BASE_URL};
pub use sink::{ArtifactHandle, ArtifactSink, LocalDirectorySink, SinkError};

#[cfg(any(test, feature = "test-utils"))]
pub use sink::mock;

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ExportConfig, SinkKind};
use crate::enrich::{EnrichedExpenseRecord, ProfileColumns};

/// Errors that abort an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

/// `<prefix>_<YYYY-MM-DD>.csv`
#[must_use]
pub fn snapshot_file_name(prefix: &str, as_of: NaiveDate) -> String {
    format!("{prefix}_{}.csv", as_of.format("%Y-%m-%d"))
}

/// Render rows as CSV.
///
/// The header is the union of every row's columns in first-seen order; a row
/// missing a column gets an empty cell. Strings are written raw, numbers and
/// booleans as their JSON text, null as empty, arrays and objects as compact
/// JSON. No rows means no bytes.
///
/// # Errors
/// Returns an error if the CSV writer fails.
pub fn render_csv(records: &[EnrichedExpenseRecord]) -> Result<Vec<u8>, ExportError> {
    let profile_columns = ProfileColumns::for_records(records);
    let rows: Vec<Vec<(String, Value)>> = records
        .iter()
        .map(|record| record.columns(&profile_columns))
        .collect();

    let mut header: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for row in &rows {
        for (column, _) in row {
            if seen.insert(column.as_str()) {
                header.push(column.as_str());
            }
        }
    }

    if header.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(&header)?;

    for row in &rows {
        let cells: HashMap<&str, &Value> = row
            .iter()
            .map(|(column, value)| (column.as_str(), value))
            .collect();
        writer.write_record(
            header
                .iter()
                .map(|column| cells.get(column).map_or_else(String::new, |v| render_value(v))),
        )?;
    }

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Build the sink selected by `export.sink`.
#[must_use]
pub fn sink_from_config(config: &ExportConfig) -> Box<dyn ArtifactSink> {
    match config.sink {
        SinkKind::Local => Box::new(LocalDirectorySink::new(&config.local_dir)),
        SinkKind::Gcs => Box::new(GcsSink::new(
            &config.gcs.base_url,
            &config.gcs.access_token,
        )),
    }
}

/// Serializes the joined dataset and delegates persistence to a sink.
pub struct SnapshotExporter {
    sink: Box<dyn ArtifactSink>,
    container: String,
    file_prefix: String,
    local_copy_dir: Option<PathBuf>,
}

impl SnapshotExporter {
    pub fn new(
        sink: Box<dyn ArtifactSink>,
        container: impl Into<String>,
        file_prefix: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            container: container.into(),
            file_prefix: file_prefix.into(),
            local_copy_dir: None,
        }
    }

    /// Exporter configured from the `export` section.
    #[must_use]
    pub fn from_config(sink: Box<dyn ArtifactSink>, config: &ExportConfig) -> Self {
        Self::new(sink, &config.container, &config.file_prefix)
            .with_local_copy_dir(config.local_copy_dir.as_ref().map(PathBuf::from))
    }

    /// Also write the CSV to `dir` before uploading.
    #[must_use]
    pub fn with_local_copy_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.local_copy_dir = dir;
        self
    }

    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    #[must_use]
    pub fn file_name(&self, as_of: NaiveDate) -> String {
        snapshot_file_name(&self.file_prefix, as_of)
    }

    /// Render `records` and upload them as the snapshot for `as_of`.
    ///
    /// # Errors
    /// Returns an error if serialization, the local copy, or the upload fails.
    pub async fn export(
        &self,
        records: &[EnrichedExpenseRecord],
        as_of: NaiveDate,
    ) -> Result<ArtifactHandle, ExportError> {
        let name = self.file_name(as_of);
        let bytes = render_csv(records)?;

        if records.is_empty() {
            warn!(name = %name, "no expense rows, snapshot will be empty");
        }

        if let Some(dir) = &self.local_copy_dir {
            tokio::fs::create_dir_all(dir).await?;
            let path = dir.join(&name);
            tokio::fs::write(&path, &bytes).await?;
            info!(path = %path.display(), "local snapshot copy written");
        }

        let handle = self.sink.upload(&self.container, &name, bytes).await?;
        info!(
            container = %handle.container,
            name = %handle.name,
            location = %handle.location,
            bytes = handle.size,
            "snapshot saved"
        );
        Ok(handle)
    }
}
