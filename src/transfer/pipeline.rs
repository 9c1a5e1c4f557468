// src/transfer/pipeline.rs

//! Transfer, log, archive.
//!
//! The steps run in a fixed order and each one gates the next. A failed
//! step stops the run for this invocation but never undoes an earlier one:
//! a run whose success record was written is not copied again, even if
//! archiving failed. A run copied without a success record is marked in its
//! directory and left for an operator.
//!
//! Delivery runs are mirrored on every invocation while they sequence. Once
//! the summary appears they get a final sync, then the finished indicator is
//! pushed after them so the receiving side only ever sees complete runs.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::notify::{Notification, Notifier};
use crate::run::snapshot::{RUN_PATH_FILE, SYNC_FINISHED_MARKER, TRANSFERRED_UNLOGGED_MARKER};
use crate::run::{InstrumentRun, RunState};
use crate::transfer::agent::TransferAgent;
use crate::transfer::log::{TransferLog, TransferOutcome, TransferRecord};
use crate::types::RunCategory;

/// How far the pipeline got for one run.
#[derive(Debug)]
pub enum PipelineResult {
    /// Not eligible for transfer in its current state.
    NotEligible,
    /// Delivery run still sequencing; what exists so far was synced.
    Mirrored,
    /// Transferred earlier and already archived.
    AlreadyArchived,
    /// Copied (or found already copied), logged and archived.
    Archived { target: PathBuf, copied: bool },
    TransferFailed(RunsyncError),
    /// Copied but the success record could not be written. Needs an
    /// operator; archiving is not attempted.
    LogWriteFailed(RunsyncError),
    /// An earlier copy was never logged. Escalated again, nothing copied.
    AwaitingOperator(RunsyncError),
    /// Transferred and logged but still in the active tree.
    ArchiveFailed { error: RunsyncError, copied: bool },
}

impl PipelineResult {
    pub fn into_error(self) -> Option<RunsyncError> {
        match self {
            PipelineResult::TransferFailed(e)
            | PipelineResult::LogWriteFailed(e)
            | PipelineResult::AwaitingOperator(e) => Some(e),
            PipelineResult::ArchiveFailed { error, .. } => Some(error),
            _ => None,
        }
    }
}

pub struct TransferPipeline<'a> {
    fs: &'a dyn FileSystem,
    agent: &'a dyn TransferAgent,
    notifier: &'a dyn Notifier,
}

impl<'a> TransferPipeline<'a> {
    pub fn new(fs: &'a dyn FileSystem, agent: &'a dyn TransferAgent, notifier: &'a dyn Notifier) -> Self {
        Self { fs, agent, notifier }
    }

    pub async fn execute(
        &self,
        run: &dyn InstrumentRun,
        state: RunState,
        log: &mut TransferLog,
    ) -> PipelineResult {
        let id = &run.run().id;

        // Already-transferred check: the log wins over every marker.
        if run.is_transferred(log) {
            return match state {
                RunState::Archived => {
                    info!(run_id = %id, "run already transferred and archived");
                    PipelineResult::AlreadyArchived
                }
                _ => {
                    warn!(run_id = %id, "run has already been transferred; skipping copy, retrying archive");
                    self.archive(run, false).await
                }
            };
        }

        if state == RunState::TransferUnlogged {
            return self.escalate_unlogged(run, log).await;
        }

        let delivery = run.run().category == RunCategory::Delivery;
        if delivery && state == RunState::SequencingInProgress {
            return self.mirror(run).await;
        }

        if !state.is_transfer_eligible() {
            info!(run_id = %id, %state, "not eligible for transfer yet");
            return PipelineResult::NotEligible;
        }

        if delivery {
            self.record_run_path(run);
        }
        info!(run_id = %id, instrument = run.display_name(), "transferring run");
        let copied = match run.transfer(self.agent).await {
            Ok(()) if delivery => self.push_finished_indicator(run).await,
            other => other,
        };
        if let Err(err) = copied {
            error!(run_id = %id, error = %err, "transfer failed");
            let record = TransferRecord::new(id, Utc::now(), TransferOutcome::Failure);
            if let Err(e) = log.append(self.fs, record) {
                warn!(run_id = %id, error = %e, "could not record failed transfer attempt");
            }
            self.notifier
                .notify(&Notification::processed_with_errors(
                    id,
                    format!(
                        "An error occurred during transfer of run {id} to the analysis cluster.\n{err}"
                    ),
                ))
                .await;
            return PipelineResult::TransferFailed(err);
        }

        let record = TransferRecord::new(id, Utc::now(), TransferOutcome::Success);
        if let Err(err) = log.append(self.fs, record) {
            error!(run_id = %id, error = %err, "run copied but transfer log not updated");
            let marker = run.run().dir.join(TRANSFERRED_UNLOGGED_MARKER);
            let blocked = if err.is_retryable() {
                None
            } else {
                Some(self.fs.write(&marker, Utc::now().to_rfc3339().as_bytes()))
            };
            let next = match blocked {
                None => "The copy will be repeated on the next invocation.".to_string(),
                Some(Ok(())) => format!(
                    "It will not be copied again. Add a success record for it to the log to \
                     have it archived, or remove {} to copy it again.",
                    marker.display()
                ),
                Some(Err(e)) => {
                    error!(run_id = %id, error = %e, "could not mark run as copied but unlogged");
                    format!(
                        "Marking the run as copied also failed ({e:#}); record the transfer by \
                         hand before the next invocation or the run will be copied again."
                    )
                }
            };
            self.notifier
                .notify(&Notification::processed_with_errors(
                    id,
                    format!(
                        "Run {id} has been transferred, but an error occurred while updating \
                         the transfer log {}. {next}\n{err}",
                        log.path().display()
                    ),
                ))
                .await;
            return PipelineResult::LogWriteFailed(err);
        }
        info!(run_id = %id, "run has been synced to the analysis cluster");

        self.archive(run, true).await
    }

    async fn escalate_unlogged(&self, run: &dyn InstrumentRun, log: &TransferLog) -> PipelineResult {
        let id = &run.run().id;
        let marker = run.run().dir.join(TRANSFERRED_UNLOGGED_MARKER);
        error!(run_id = %id, marker = %marker.display(), "run was copied but never logged; not copying again");
        let err = RunsyncError::LogWriteFailure(format!(
            "run {id} was copied by an earlier invocation but {} has no success record for it",
            log.path().display()
        ));
        self.notifier
            .notify(&Notification::processed_with_errors(
                id,
                format!(
                    "Run {id} is still waiting for an operator. Add a success record for it to \
                     {} to have it archived, or remove {} to copy it again.\n{err}",
                    log.path().display(),
                    marker.display()
                ),
            ))
            .await;
        PipelineResult::AwaitingOperator(err)
    }

    /// Sync a delivery run that is still sequencing. Nothing is logged.
    async fn mirror(&self, run: &dyn InstrumentRun) -> PipelineResult {
        let id = &run.run().id;
        self.record_run_path(run);
        info!(run_id = %id, "sequencing ongoing; syncing the data written so far");
        match run.transfer(self.agent).await {
            Ok(()) => PipelineResult::Mirrored,
            Err(err) => {
                warn!(run_id = %id, error = %err, "sync of ongoing run failed");
                self.notifier
                    .notify(&Notification::processed_with_errors(
                        id,
                        format!(
                            "An error occurred while syncing ongoing run {id}; it will be retried \
                             on the next invocation.\n{err}"
                        ),
                    ))
                    .await;
                PipelineResult::TransferFailed(err)
            }
        }
    }

    /// Leave `run_path.txt` in the run so the receiving side can group it by
    /// project. Kept if the instrument already wrote one.
    fn record_run_path(&self, run: &dyn InstrumentRun) {
        let path = run.run().dir.join(RUN_PATH_FILE);
        if self.fs.is_file(&path) {
            return;
        }
        let relative = run.run().relative_path();
        if let Err(e) = self.fs.write(&path, relative.to_string_lossy().as_bytes()) {
            warn!(run_id = %run.run().id, error = %e, "could not write run_path.txt");
        }
    }

    async fn push_finished_indicator(&self, run: &dyn InstrumentRun) -> Result<()> {
        let indicator = run.run().dir.join(SYNC_FINISHED_MARKER);
        self.fs.write(&indicator, b"")?;
        let target = format!(
            "{}/{}/{SYNC_FINISHED_MARKER}",
            run.settings().destination.trim_end_matches('/'),
            run.run().id
        );
        self.agent.copy_file(&indicator, &target).await?;
        info!(run_id = %run.run().id, target, "finished indicator delivered");
        Ok(())
    }

    async fn archive(&self, run: &dyn InstrumentRun, copied: bool) -> PipelineResult {
        let id = &run.run().id;
        let done = match run.run().category {
            RunCategory::Qc => "analysed, transferred and archived",
            RunCategory::User | RunCategory::Delivery => "transferred and archived",
        };

        match run.archive(self.fs) {
            Ok(target) => {
                info!(run_id = %id, target = %target.display(), "run is finished and has been archived");
                self.notifier
                    .notify(&Notification::processed(
                        id,
                        format!("Run {id} has been {done} successfully."),
                    ))
                    .await;
                PipelineResult::Archived { target, copied }
            }
            Err(error) => {
                error!(run_id = %id, %error, "archiving failed");
                self.notifier
                    .notify(&Notification::processed_with_errors(
                        id,
                        format!(
                            "Run {id} has been transferred, but an error occurred during archiving.\n{error}"
                        ),
                    ))
                    .await;
                PipelineResult::ArchiveFailed { error, copied }
            }
        }
    }
}
