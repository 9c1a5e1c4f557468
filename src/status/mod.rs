// src/status/mod.rs

//! Persistent status documents, one per run.
//!
//! - [`store`] holds the [`StatusStore`] implementations.
//! - [`metadata`] collects what goes into a new document.
//! - [`report`] trims the machine report stored on finalization.
//! - [`sync`] reconciles a run's evaluated state with its document.
//!
//! A document is never deleted here and its status only moves from
//! `ongoing` to `finished`.

pub mod metadata;
pub mod report;
pub mod store;
pub mod sync;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;
use crate::run::RunId;
use crate::types::DocumentStatus;

pub use metadata::RunMetadata;
pub use store::{JsonDirStore, MemoryStore};
pub use sync::Synchronizer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    pub run_id: RunId,
    pub status: DocumentStatus,
    pub metadata: RunMetadata,
    /// Trimmed acquisition report, set on finalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StatusDocument {
    pub fn ongoing(run_id: RunId, metadata: RunMetadata, at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            status: DocumentStatus::Ongoing,
            metadata,
            report: None,
            created_at: at,
            finished_at: None,
        }
    }
}

/// Result of asking the store to finish a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    Finished,
    /// The document was already finished; nothing was written.
    AlreadyFinished,
}

/// Trait abstracting where status documents live.
///
/// Implementations report every failure as `RunsyncError::StoreFailure` and
/// leave the stored document unchanged when a write fails.
pub trait StatusStore: Send + Sync {
    fn get(&self, run_id: &RunId) -> Result<Option<StatusDocument>>;

    /// Store a new document. Fails if one already exists for the run.
    fn create(&self, doc: &StatusDocument) -> Result<()>;

    /// Move an `ongoing` document to `finished` with the trimmed report.
    ///
    /// Finishing an already finished document is a no-op.
    fn finish(&self, run_id: &RunId, report: Value, at: DateTime<Utc>) -> Result<FinishOutcome>;

    fn exists(&self, run_id: &RunId) -> Result<bool> {
        Ok(self.get(run_id)?.is_some())
    }

    fn status(&self, run_id: &RunId) -> Result<Option<DocumentStatus>> {
        Ok(self.get(run_id)?.map(|doc| doc.status))
    }
}
