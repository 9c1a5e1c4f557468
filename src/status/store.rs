// src/status/store.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::run::RunId;
use crate::types::DocumentStatus;

use super::{FinishOutcome, StatusDocument, StatusStore};

/// One pretty-printed `<run_id>.json` per run in a directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self { fs, dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self, run_id: &RunId) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }

    fn write(&self, doc: &StatusDocument) -> Result<()> {
        let path = self.document_path(&doc.run_id);
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| RunsyncError::StoreFailure(format!("serializing {}: {e}", doc.run_id)))?;
        self.fs.write(&path, &bytes).map_err(|e| {
            RunsyncError::StoreFailure(format!("writing {}: {e:#}", path.display()))
        })?;
        debug!(run_id = %doc.run_id, status = %doc.status, path = %path.display(), "status document written");
        Ok(())
    }
}

impl StatusStore for JsonDirStore {
    fn get(&self, run_id: &RunId) -> Result<Option<StatusDocument>> {
        let path = self.document_path(run_id);
        if !self.fs.is_file(&path) {
            return Ok(None);
        }
        let contents = self.fs.read_to_string(&path).map_err(|e| {
            RunsyncError::StoreFailure(format!("reading {}: {e:#}", path.display()))
        })?;
        let doc = serde_json::from_str(&contents).map_err(|e| {
            RunsyncError::StoreFailure(format!("parsing {}: {e}", path.display()))
        })?;
        Ok(Some(doc))
    }

    fn create(&self, doc: &StatusDocument) -> Result<()> {
        if self.get(&doc.run_id)?.is_some() {
            return Err(RunsyncError::StoreFailure(format!(
                "a document for {} already exists",
                doc.run_id
            )));
        }
        self.write(doc)
    }

    fn finish(&self, run_id: &RunId, report: Value, at: DateTime<Utc>) -> Result<FinishOutcome> {
        let mut doc = self.get(run_id)?.ok_or_else(|| {
            RunsyncError::StoreFailure(format!("no document for {run_id} to finish"))
        })?;
        if doc.status == DocumentStatus::Finished {
            return Ok(FinishOutcome::AlreadyFinished);
        }
        doc.status = DocumentStatus::Finished;
        doc.report = Some(report);
        doc.finished_at = Some(at);
        self.write(&doc)?;
        Ok(FinishOutcome::Finished)
    }
}

/// In-memory store; writes can be made to fail for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<BTreeMap<RunId, StatusDocument>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }

    pub fn documents(&self) -> Vec<StatusDocument> {
        self.docs
            .lock()
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check_writable(&self) -> Result<()> {
        let failing = self.fail_writes.lock().map(|f| *f).unwrap_or(true);
        if failing {
            return Err(RunsyncError::StoreFailure("store is not accepting writes".to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<RunId, StatusDocument>>> {
        self.docs
            .lock()
            .map_err(|_| RunsyncError::StoreFailure("memory store lock poisoned".to_string()))
    }
}

impl StatusStore for MemoryStore {
    fn get(&self, run_id: &RunId) -> Result<Option<StatusDocument>> {
        Ok(self.lock()?.get(run_id).cloned())
    }

    fn create(&self, doc: &StatusDocument) -> Result<()> {
        self.check_writable()?;
        let mut docs = self.lock()?;
        if docs.contains_key(&doc.run_id) {
            return Err(RunsyncError::StoreFailure(format!(
                "a document for {} already exists",
                doc.run_id
            )));
        }
        docs.insert(doc.run_id.clone(), doc.clone());
        Ok(())
    }

    fn finish(&self, run_id: &RunId, report: Value, at: DateTime<Utc>) -> Result<FinishOutcome> {
        let mut docs = self.lock()?;
        let doc = docs.get_mut(run_id).ok_or_else(|| {
            RunsyncError::StoreFailure(format!("no document for {run_id} to finish"))
        })?;
        if doc.status == DocumentStatus::Finished {
            return Ok(FinishOutcome::AlreadyFinished);
        }
        self.check_writable()?;
        doc.status = DocumentStatus::Finished;
        doc.report = Some(report);
        doc.finished_at = Some(at);
        Ok(FinishOutcome::Finished)
    }
}
