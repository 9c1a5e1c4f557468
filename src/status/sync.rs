// src/status/sync.rs

//! Reconciling a run with its status document.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::run::snapshot::{HTML_REPORT_GLOB, JSON_REPORT_GLOB};
use crate::run::{Run, RunSnapshot};
use crate::transfer::agent::TransferAgent;
use crate::types::DocumentStatus;

use super::metadata::RunMetadata;
use super::report::trim_report;
use super::{FinishOutcome, StatusDocument, StatusStore};

/// What one reconciliation pass did and what went wrong.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub created: bool,
    pub finalized: bool,
    /// Where the human-readable report was copied to.
    pub published: Option<String>,
    /// Halts the run for this invocation.
    pub sync_error: Option<RunsyncError>,
    /// Retried on the next invocation; does not halt the run.
    pub publish_error: Option<RunsyncError>,
}

pub struct Synchronizer<'a> {
    fs: &'a dyn FileSystem,
    store: &'a dyn StatusStore,
    agent: &'a dyn TransferAgent,
    report_types: &'a [String],
    shared_dir: Option<&'a str>,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        store: &'a dyn StatusStore,
        agent: &'a dyn TransferAgent,
        report_types: &'a [String],
        shared_dir: Option<&'a str>,
    ) -> Self {
        Self {
            fs,
            store,
            agent,
            report_types,
            shared_dir,
        }
    }

    /// Create an `ongoing` document if the run has none. Returns whether a
    /// document was created.
    pub fn ensure_ongoing(&self, run: &Run) -> Result<bool> {
        if self.store.exists(&run.id)? {
            debug!(run_id = %run.id, "status document exists");
            return Ok(false);
        }
        info!(run_id = %run.id, "no status document yet; creating ongoing document");
        let metadata = RunMetadata::collect(self.fs, run)?;
        self.store
            .create(&StatusDocument::ongoing(run.id.clone(), metadata, Utc::now()))?;
        info!(run_id = %run.id, "created status document for ongoing run");
        Ok(true)
    }

    /// Finish the document once sequencing is done. Returns whether this call
    /// made the transition.
    pub fn finalize(&self, run: &Run, snapshot: &RunSnapshot) -> Result<bool> {
        match self.store.status(&run.id)? {
            Some(DocumentStatus::Ongoing) => {}
            Some(DocumentStatus::Finished) => return Ok(false),
            None => {
                return Err(RunsyncError::StoreFailure(format!(
                    "no status document for {} to finalize",
                    run.id
                )));
            }
        }
        if !snapshot.has_summary() {
            debug!(run_id = %run.id, "sequencing not finished; document stays ongoing");
            return Ok(false);
        }

        let name = snapshot.unique_match(JSON_REPORT_GLOB, ".json report")?;
        let contents = self.fs.read_to_string(&run.dir.join(&name))?;
        let trimmed = trim_report(&contents, self.report_types, &name)?;

        match self.store.finish(&run.id, trimmed.report, Utc::now())? {
            FinishOutcome::Finished => {
                info!(run_id = %run.id, "status document finished");
                Ok(true)
            }
            FinishOutcome::AlreadyFinished => Ok(false),
        }
    }

    /// Copy the single `report*.html` to `<shared_dir>/report_<run_id>.html`.
    pub async fn publish_report(&self, run: &Run, snapshot: &RunSnapshot) -> Result<String> {
        let shared_dir = self.shared_dir.ok_or_else(|| {
            RunsyncError::ConfigError("[reports] shared_dir is not configured".to_string())
        })?;
        let name = snapshot.unique_match(HTML_REPORT_GLOB, ".html report")?;
        let destination = format!(
            "{}/report_{}.html",
            shared_dir.trim_end_matches('/'),
            run.id
        );
        self.agent
            .copy_file(&run.dir.join(&name), &destination)
            .await?;
        info!(run_id = %run.id, destination, "published run report");
        Ok(destination)
    }

    /// Run the whole protocol for one run: ensure a document, finalize it when
    /// sequencing is done, publish the report once finished.
    pub async fn reconcile(&self, run: &Run, snapshot: &RunSnapshot) -> SyncReport {
        let mut report = SyncReport::default();

        match self.ensure_ongoing(run) {
            Ok(created) => report.created = created,
            Err(err) => {
                warn!(run_id = %run.id, error = %err, "status update failed");
                report.sync_error = Some(err);
                return report;
            }
        }

        match self.finalize(run, snapshot) {
            Ok(finalized) => report.finalized = finalized,
            Err(err) => {
                warn!(run_id = %run.id, error = %err, "status update failed");
                report.sync_error = Some(err);
                return report;
            }
        }

        match self.store.status(&run.id) {
            Ok(Some(DocumentStatus::Finished)) => match self.publish_report(run, snapshot).await {
                Ok(dest) => report.published = Some(dest),
                Err(err) => {
                    warn!(run_id = %run.id, error = %err, "report publication failed; will retry");
                    report.publish_error = Some(err);
                }
            },
            Ok(_) => {}
            Err(err) => report.sync_error = Some(err),
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::status::MemoryStore;
    use crate::transfer::agent::LocalCopyAgent;
    use crate::types::{InstrumentKind, RunCategory};
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    const DIR: &str = "/seq/promethion/20240131_1702_1A_PAM12345_abc";

    fn setup() -> (MockFileSystem, Run) {
        let fs = MockFileSystem::new();
        fs.add_file(format!("{DIR}/run_path.txt"), "exp/sample/20240131_1702_1A_PAM12345_abc");
        fs.add_file(
            format!("{DIR}/pore_count_history.csv"),
            "flow_cell_id,timestamp\nPAM12345,2024-01-24\n",
        );
        fs.add_dir("/shared");
        let run = Run::new(
            PathBuf::from(DIR),
            PathBuf::from("/seq/promethion"),
            InstrumentKind::Promethion,
            RunCategory::User,
        )
        .unwrap();
        (fs, run)
    }

    fn report_json() -> String {
        json!({"acquisitions": [{"acquisition_output": [
            {"type": "AllData"}, {"type": "PerRead", "data": [1, 2, 3]}
        ]}]})
        .to_string()
    }

    #[tokio::test]
    async fn ongoing_then_finished_then_published() {
        let (fs, run) = setup();
        let store = MemoryStore::new();
        let agent = LocalCopyAgent::new(Arc::new(fs.clone()));
        let types = vec!["AllData".to_string()];
        let sync = Synchronizer::new(&fs, &store, &agent, &types, Some("/shared"));

        let snap = RunSnapshot::capture(&fs, &run.dir, None).unwrap();
        let first = sync.reconcile(&run, &snap).await;
        assert!(first.created && !first.finalized && first.sync_error.is_none());
        assert_eq!(store.status(&run.id).unwrap(), Some(DocumentStatus::Ongoing));

        fs.add_file(format!("{DIR}/final_summary_x.txt"), "");
        fs.add_file(format!("{DIR}/report_x.json"), report_json());
        let snap = RunSnapshot::capture(&fs, &run.dir, None).unwrap();
        let second = sync.reconcile(&run, &snap).await;
        assert!(second.finalized);
        // html report not there yet
        assert!(matches!(second.publish_error, Some(RunsyncError::MissingArtifact(_))));

        fs.add_file(format!("{DIR}/report_x.html"), "<html/>");
        let snap = RunSnapshot::capture(&fs, &run.dir, None).unwrap();
        let third = sync.reconcile(&run, &snap).await;
        assert!(!third.created && !third.finalized);
        assert_eq!(
            third.published.as_deref(),
            Some("/shared/report_20240131_1702_1A_PAM12345_abc.html")
        );
        assert!(fs.is_file(Path::new("/shared/report_20240131_1702_1A_PAM12345_abc.html")));
    }

    #[tokio::test]
    async fn missing_metadata_halts_sync() {
        let fs = MockFileSystem::new();
        fs.add_dir(DIR);
        let run = Run::new(
            PathBuf::from(DIR),
            PathBuf::from("/seq/promethion"),
            InstrumentKind::Promethion,
            RunCategory::User,
        )
        .unwrap();
        let store = MemoryStore::new();
        let agent = LocalCopyAgent::new(Arc::new(fs.clone()));
        let types = vec!["AllData".to_string()];
        let sync = Synchronizer::new(&fs, &store, &agent, &types, Some("/shared"));

        let snap = RunSnapshot::capture(&fs, &run.dir, None).unwrap();
        let report = sync.reconcile(&run, &snap).await;
        assert!(matches!(report.sync_error, Some(RunsyncError::MissingArtifact(_))));
        assert!(store.documents().is_empty());
    }

    #[test]
    fn conflicting_json_reports_block_finalization() {
        let (fs, run) = setup();
        let store = MemoryStore::new();
        let agent = LocalCopyAgent::new(Arc::new(fs.clone()));
        let types = vec!["AllData".to_string()];
        let sync = Synchronizer::new(&fs, &store, &agent, &types, None);
        sync.ensure_ongoing(&run).unwrap();

        fs.add_file(format!("{DIR}/final_summary_x.txt"), "");
        fs.add_file(format!("{DIR}/report_a.json"), report_json());
        fs.add_file(format!("{DIR}/report_b.json"), report_json());
        let snap = RunSnapshot::capture(&fs, &run.dir, None).unwrap();

        let err = sync.finalize(&run, &snap).unwrap_err();
        assert!(matches!(err, RunsyncError::MissingArtifact(m) if m.contains("conflicting")));
        assert_eq!(store.status(&run.id).unwrap(), Some(DocumentStatus::Ongoing));
    }
}
