/// Batch import of historical snapshots from a directory.
///
/// Each file is named by the integer epoch-seconds timestamp of its
/// capture and holds the raw realtime status JSON. Snapshots whose
/// timestamp is already stored are skipped, so re-running over the same
/// directory inserts nothing.
///
/// Every file is read and validated before anything is written; the new
/// snapshots are then appended in a single batch.

use crate::error::{BikeshareError, Result};
use crate::store::StatusRepository;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Outcome of one directory import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
    /// Snapshots stored after the import.
    pub total: i64,
}

/// Parses an import filename as epoch seconds.
///
/// # Errors
/// `BikeshareError::Parse` if the name is not an integer.
pub fn timestamp_from_filename(path: &Path) -> Result<DateTime<Utc>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BikeshareError::Parse(format!("unreadable file name: {}", path.display())))?;

    let secs: i64 = name.parse().map_err(|_| {
        BikeshareError::Parse(format!("import file name is not an epoch timestamp: {}", name))
    })?;

    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        BikeshareError::Parse(format!("import timestamp out of range: {}", secs))
    })
}

/// Imports every snapshot file in `dir` that isn't stored yet.
///
/// Subdirectories are ignored.
///
/// # Errors
/// - `BikeshareError::Parse` for a file whose name is not an epoch timestamp
/// - `BikeshareError::Import` for a file whose contents are not JSON
/// - `BikeshareError::Io` if the directory can't be read
pub fn import_directory<S>(store: &mut S, dir: &Path) -> Result<ImportSummary>
where
    S: StatusRepository,
{
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut pending: Vec<(Value, DateTime<Utc>)> = Vec::new();
    let mut skipped = 0;

    for path in &paths {
        let timestamp = timestamp_from_filename(path)?;

        if store.status_exists(timestamp)? || pending.iter().any(|(_, t)| *t == timestamp) {
            skipped += 1;
            continue;
        }

        let contents = fs::read(path)?;
        let data: Value = serde_json::from_slice(&contents).map_err(|e| BikeshareError::Import {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        pending.push((data, timestamp));
    }

    let inserted = if pending.is_empty() {
        0
    } else {
        store.append_batch(&pending)?
    };
    let total = store.status_count()?;

    tracing::info!(
        "Imported {} snapshots from {} ({} already present, {} total)",
        inserted,
        dir.display(),
        skipped,
        total
    );

    Ok(ImportSummary {
        inserted,
        skipped,
        total,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
