// src/qc/trigger.rs

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::QcSection;
use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::notify::{Notification, Notifier};
use crate::run::snapshot::ExitStatus;
use crate::run::{QcLayout, Run, RunSnapshot, RunState};

use super::{Demultiplexer, QcJob, SampleSheetLookup};

/// What the trigger observed or did for one run.
#[derive(Debug)]
pub enum QcProgress {
    /// Sequencing is still running.
    NotReady,
    /// Demultiplexing was started with this sample sheet.
    Launched(PathBuf),
    /// No sample sheet yet; try again next invocation.
    AwaitingSampleSheet,
    Running,
    /// Finished successfully. Carries the error of the LIMS results copy,
    /// if it failed. `first_report` is true when this invocation handed the
    /// results over and notified.
    Done {
        results_error: Option<RunsyncError>,
        first_report: bool,
    },
    /// Finished with an error. `first_report` is true when this invocation
    /// sent the failure notification.
    Failed { status: ExitStatus, first_report: bool },
    /// Past QC already (transfer pending or later).
    NotApplicable,
}

pub struct QcTrigger<'a> {
    fs: &'a dyn FileSystem,
    qc: &'a QcSection,
    lookup: &'a dyn SampleSheetLookup,
    demux: &'a dyn Demultiplexer,
    notifier: &'a dyn Notifier,
    samplesheet: Option<&'a Path>,
}

impl<'a> QcTrigger<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        qc: &'a QcSection,
        lookup: &'a dyn SampleSheetLookup,
        demux: &'a dyn Demultiplexer,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            fs,
            qc,
            lookup,
            demux,
            notifier,
            samplesheet: None,
        }
    }

    /// Use this sample sheet instead of looking one up.
    pub fn with_samplesheet(mut self, samplesheet: Option<&'a Path>) -> Self {
        self.samplesheet = samplesheet;
        self
    }

    pub fn layout(&self) -> QcLayout {
        QcLayout::from(self.qc)
    }

    /// Move a QC run one step forward. Never blocks on the demultiplexer.
    pub async fn advance(&self, run: &Run, snapshot: &RunSnapshot, state: RunState) -> Result<QcProgress> {
        match state {
            RunState::SequencingInProgress => {
                info!(run_id = %run.id, "sequencing is still ongoing; skipping");
                Ok(QcProgress::NotReady)
            }
            RunState::QcPending => self.launch(run).await,
            RunState::QcRunning => {
                info!(run_id = %run.id, "demultiplexing has started but is not done; skipping");
                Ok(QcProgress::Running)
            }
            RunState::QcDone => Ok(self.on_success(run, snapshot).await),
            RunState::QcFailed(status) => Ok(self.on_failure(run, snapshot, status).await),
            _ => Ok(QcProgress::NotApplicable),
        }
    }

    async fn launch(&self, run: &Run) -> Result<QcProgress> {
        let samplesheet = match self.samplesheet {
            Some(path) => Some(path.to_path_buf()),
            None => self.lookup.find(run)?,
        };
        let Some(samplesheet) = samplesheet.filter(|p| self.fs.is_file(p)) else {
            warn!(
                run_id = %run.id,
                "sample sheet missing; provide one with --samplesheet or complete the LIMS step"
            );
            return Ok(QcProgress::AwaitingSampleSheet);
        };

        let job = QcJob::new(run, &self.layout(), samplesheet.clone());
        self.fs.create_dir_all(&job.output_dir)?;
        if let Err(err) = self.demux.launch(&job).await {
            // Without this the next invocation would take the run for running.
            if let Err(e) = self.fs.remove_dir(&job.output_dir) {
                warn!(run_id = %run.id, error = %e, "could not remove QC output dir after failed launch");
            }
            return Err(err);
        }
        Ok(QcProgress::Launched(samplesheet))
    }

    async fn on_success(&self, run: &Run, snapshot: &RunSnapshot) -> QcProgress {
        if snapshot.qc.as_ref().is_some_and(|q| q.success_notified) {
            info!(run_id = %run.id, "QC results were handed over earlier; nothing to do");
            return QcProgress::Done {
                results_error: None,
                first_report: false,
            };
        }

        let results_error = self.copy_results(run).err();
        let notification = match &results_error {
            None => {
                info!(run_id = %run.id, "demultiplexing finished OK; notifying operator");
                Notification::new(
                    format!("QC successfully processed run {}", run.id),
                    format!(
                        "QC demultiplexing has successfully finished for run {}. \
                         Please finish the QC step in LIMS.",
                        run.id
                    ),
                )
            }
            Some(err) => Notification::processed_with_errors(
                &run.id,
                format!(
                    "QC demultiplexing has successfully finished for run {} but an error \
                     occurred while transferring the results to LIMS.\n{err}",
                    run.id
                ),
            ),
        };
        self.notifier.notify(&notification).await;

        let marker = self.layout().success_notified_path(&run.dir);
        if let Err(e) = self.fs.write(&marker, b"") {
            warn!(run_id = %run.id, error = %e, "could not record that the QC results were handed over");
        }
        QcProgress::Done {
            results_error,
            first_report: true,
        }
    }

    /// Copy the stats file to the LIMS results dir as `<run_id>_<name>`.
    fn copy_results(&self, run: &Run) -> Result<Option<PathBuf>> {
        let Some(results_dir) = &self.qc.results_dir else {
            return Ok(None);
        };
        let stats = self.layout().output_dir(&run.dir).join(&self.qc.stats_file_name);
        if !self.fs.is_file(&stats) {
            return Err(RunsyncError::MissingArtifact(format!(
                "QC stats file {} not found",
                stats.display()
            )));
        }
        let target = results_dir.join(format!("{}_{}", run.id, self.qc.stats_file_name));
        self.fs.copy_file(&stats, &target)?;
        info!(run_id = %run.id, target = %target.display(), "copied QC results for LIMS");
        Ok(Some(target))
    }

    async fn on_failure(&self, run: &Run, snapshot: &RunSnapshot, status: ExitStatus) -> QcProgress {
        let already = snapshot.qc.as_ref().is_some_and(|q| q.failure_notified);
        if already {
            info!(run_id = %run.id, "QC failed earlier and was reported; waiting for an operator");
            return QcProgress::Failed {
                status,
                first_report: false,
            };
        }

        warn!(run_id = %run.id, ?status, "demultiplexing exited with errors; notifying operator");
        let notification = Notification::processed_with_errors(
            &run.id,
            format!(
                "QC demultiplexing exited with errors ({status:?}) for run {}. \
                 Please check the log files and restart.",
                run.id
            ),
        );
        self.notifier.notify(&notification).await;

        let marker = self.layout().failure_notified_path(&run.dir);
        if let Err(e) = self.fs.write(&marker, b"") {
            warn!(run_id = %run.id, error = %e, "could not record that the QC failure was reported");
        }
        QcProgress::Failed {
            status,
            first_report: true,
        }
    }
}
