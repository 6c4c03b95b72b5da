//! JSON export of big-key records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use keyward_core::{KeyRecord, KeyType};
use serde::Serialize;
use thiserror::Error;

/// Error writing an export file.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The file could not be created or written.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Target path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Records could not be encoded.
    #[error("failed to encode export: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One exported key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedKey<'a> {
    /// Key name.
    pub key: &'a str,
    /// Value type.
    #[serde(rename = "type")]
    pub key_type: KeyType,
    /// `MEMORY USAGE` in bytes.
    pub memory_bytes: u64,
    /// Size in mebibytes, rounded to two decimals.
    pub memory_mb: f64,
    /// Remaining ttl in seconds (`-1` no expiry).
    pub ttl: i64,
    /// Element count.
    pub elements: u64,
}

impl<'a> From<&'a KeyRecord> for ExportedKey<'a> {
    fn from(record: &'a KeyRecord) -> Self {
        Self {
            key: &record.name,
            key_type: record.key_type,
            memory_bytes: record.size_bytes,
            memory_mb: (record.size_mb() * 100.0).round() / 100.0,
            ttl: record.ttl_seconds,
            elements: record.element_count,
        }
    }
}

/// Writes `records` as a pretty-printed JSON array.
pub fn write_json<W: Write>(records: &[KeyRecord], writer: W) -> Result<(), serde_json::Error> {
    let exported: Vec<ExportedKey<'_>> = records.iter().map(ExportedKey::from).collect();
    serde_json::to_writer_pretty(writer, &exported)
}

/// Writes `records` to the file at `path`, replacing it.
pub fn export_json(records: &[KeyRecord], path: impl AsRef<Path>) -> Result<(), ExportError> {
    let path = path.as_ref();
    let io_error = |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
    write_json(records, &mut writer)?;
    writer.flush().map_err(io_error)
}
