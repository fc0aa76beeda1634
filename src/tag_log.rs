// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Append-only CSV log of tagging attempts

use serde::Deserialize;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::record::{TaggingRecord, COLUMNS};
use crate::Result;

/// Open tagging log plus the set of inputs it already covers.
///
/// Rows are only ever appended, and each one reaches the disk before
/// [`TaggingLog::append`] returns.
pub struct TaggingLog {
    path: PathBuf,
    writer: csv::Writer<File>,
    processed: HashSet<String>,
}

impl TaggingLog {
    /// Open `path` for appending, creating it with a header row if needed.
    ///
    /// With `retry_errors` only inputs that have an `ok` row count as
    /// processed; otherwise any row at all does.
    pub fn open(path: &Path, retry_errors: bool) -> Result<Self> {
        let existing_len = match std::fs::metadata(path) {
            Ok(meta) => Some(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let processed = match existing_len {
            Some(len) if len > 0 => processed_keys(path, retry_errors)?,
            _ => HashSet::new(),
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if existing_len.unwrap_or(0) == 0 {
            writer.write_record(COLUMNS)?;
            writer.flush()?;
            info!("Created tagging log at {:?}", path);
        } else {
            info!(
                "Resuming tagging log at {:?} ({} inputs already processed)",
                path,
                processed.len()
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            processed,
        })
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.processed.contains(key)
    }

    /// Claim `key` for this run. Returns false when it was already claimed
    /// or is covered by earlier rows.
    pub fn claim(&mut self, key: &str) -> bool {
        self.processed.insert(key.to_string())
    }

    /// Append one row and push it to storage.
    pub fn append(&mut self, record: &TaggingRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        debug!("Logged {:?} for {}", record.status, record.original_filepath);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The columns that decide whether an input is done
#[derive(Debug, Deserialize)]
struct LogKey {
    original_filepath: String,
    #[serde(default)]
    status: String,
}

/// Identity keys in the log at `path` that a run must skip.
///
/// Only `original_filepath` and `status` are read, so other cells may hold
/// anything.
pub fn processed_keys(path: &Path, retry_errors: bool) -> Result<HashSet<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let mut keys = HashSet::new();
    for row in reader.deserialize::<LogKey>() {
        match row {
            Ok(row) if !retry_errors || row.status.trim().eq_ignore_ascii_case("ok") => {
                keys.insert(row.original_filepath);
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable row of {:?}: {}", path, e),
        }
    }
    Ok(keys)
}

/// Read every row of a tagging log, in file order.
pub fn read_records(path: &Path) -> Result<Vec<TaggingRecord>> {
    Ok(read_records_with_column(path, "")?
        .into_iter()
        .map(|(record, _)| record)
        .collect())
}

/// [`read_records`] plus the raw value of an extra `column` outside the
/// log schema, when the file has one.
///
/// Rows that cannot be read as a record are skipped with a warning.
pub fn read_records_with_column(path: &Path, column: &str) -> Result<Vec<(TaggingRecord, Option<String>)>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let extra = headers.iter().position(|h| !column.is_empty() && h == column);

    let mut rows = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        match row.deserialize::<TaggingRecord>(Some(&headers)) {
            Ok(record) => {
                let value = extra.and_then(|i| row.get(i)).map(String::from);
                rows.push((record, value));
            }
            Err(e) => warn!("Skipping unreadable row {} of {:?}: {}", index + 1, path, e),
        }
    }
    Ok(rows)
}
