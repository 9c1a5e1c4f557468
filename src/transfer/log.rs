// src/transfer/log.rs

//! Append-only transfer log.
//!
//! One tab-separated line per completed transfer attempt:
//!
//! `<run_id>\t<rfc3339 timestamp>\t<success|failure>`
//!
//! Older logs only have the first two columns; such lines count as
//! successful transfers. A success line for a run is the single source of
//! truth for "already transferred".

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::run::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Success,
    Failure,
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Success => f.write_str("success"),
            TransferOutcome::Failure => f.write_str("failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub run_id: String,
    pub timestamp: String,
    pub outcome: TransferOutcome,
}

impl TransferRecord {
    pub fn new(run_id: &RunId, at: DateTime<Utc>, outcome: TransferOutcome) -> Self {
        Self {
            run_id: run_id.to_string(),
            timestamp: at.to_rfc3339(),
            outcome,
        }
    }

    fn parse_line(line: &str) -> Option<Self> {
        let mut cols = line.split('\t');
        let run_id = cols.next()?.trim();
        if run_id.is_empty() {
            return None;
        }
        let timestamp = cols.next().unwrap_or_default().trim().to_string();
        let outcome = match cols.next().map(str::trim) {
            None | Some("") | Some("success") => TransferOutcome::Success,
            Some("failure") => TransferOutcome::Failure,
            Some(other) => {
                warn!(run_id, outcome = other, "unknown outcome in transfer log; treating as failure");
                TransferOutcome::Failure
            }
        };
        Some(Self {
            run_id: run_id.to_string(),
            timestamp,
            outcome,
        })
    }

    fn to_line(&self) -> String {
        format!("{}\t{}\t{}\n", self.run_id, self.timestamp, self.outcome)
    }
}

#[derive(Debug, Clone)]
pub struct TransferLog {
    path: PathBuf,
    records: Vec<TransferRecord>,
}

impl TransferLog {
    /// Read the log at `path`. A missing file is an empty log.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let records = if fs.is_file(path) {
            fs.read_to_string(path)?
                .lines()
                .filter_map(TransferRecord::parse_line)
                .collect()
        } else {
            debug!(log = %path.display(), "transfer log does not exist yet");
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[TransferRecord] {
        &self.records
    }

    pub fn is_transferred(&self, run_id: &RunId) -> bool {
        self.records
            .iter()
            .any(|r| r.run_id == run_id.as_str() && r.outcome == TransferOutcome::Success)
    }

    /// Durably append a record. Failure is reported as a log write failure.
    pub fn append(&mut self, fs: &dyn FileSystem, record: TransferRecord) -> Result<()> {
        fs.append(&self.path, record.to_line().as_bytes())
            .map_err(|e| {
                RunsyncError::LogWriteFailure(format!(
                    "could not record {} for run {} in {}: {e:#}",
                    record.outcome,
                    record.run_id,
                    self.path.display()
                ))
            })?;
        self.records.push(record);
        Ok(())
    }
}
