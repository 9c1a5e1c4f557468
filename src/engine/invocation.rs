// src/engine/invocation.rs

//! One cron-style pass over the configured runs.
//!
//! Each run is an isolated unit of work: everything that goes wrong for it
//! is logged, notified and recorded in its [`RunOutcome`], and the next run
//! is processed regardless.

use std::path::{Path, PathBuf};

use tracing::{debug, info, info_span, warn, Instrument};

use crate::cli::CategoryArg;
use crate::config::{ConfigFile, InstrumentSection};
use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::notify::{Notification, Notifier};
use crate::qc::{Demultiplexer, QcProgress, QcTrigger, SampleSheetLookup};
use crate::run::locator::{locate_all, resolve_explicit};
use crate::run::{instrument_run, InstrumentRun, Located, QcLayout, Run, RunFlags, RunSnapshot, RunState};
use crate::status::sync::Synchronizer;
use crate::status::StatusStore;
use crate::transfer::agent::TransferAgent;
use crate::transfer::log::TransferLog;
use crate::transfer::pipeline::TransferPipeline;
use crate::types::{DocumentStatus, InstrumentKind, RunCategory};

use super::plan::{plan, Mode, Step};

/// Left in a dated directory whose name is not a valid run id once it has
/// been reported.
pub const REJECTED_MARKER: &str = ".runsync_rejected";

/// The collaborators an invocation drives. QC collaborators are only
/// needed when QC runs are configured; the store only when status is
/// tracked.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub fs: &'a dyn FileSystem,
    pub agent: &'a dyn TransferAgent,
    pub notifier: &'a dyn Notifier,
    pub store: Option<&'a dyn StatusStore>,
    pub demux: Option<&'a dyn Demultiplexer>,
    pub samplesheets: Option<&'a dyn SampleSheetLookup>,
}

/// What happened to one run during an invocation.
#[derive(Debug)]
pub struct RunOutcome {
    pub path: PathBuf,
    pub run_id: Option<String>,
    pub category: RunCategory,
    pub instrument: InstrumentKind,
    pub initial_state: Option<RunState>,
    pub final_state: Option<RunState>,
    /// Steps that were attempted, in order.
    pub steps: Vec<Step>,
    pub errors: Vec<RunsyncError>,
}

impl RunOutcome {
    fn new(located: &Located) -> Self {
        Self {
            path: located.path.clone(),
            run_id: None,
            category: located.category,
            instrument: located.instrument,
            initial_state: None,
            final_state: None,
            steps: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One line of the `status` listing.
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub path: PathBuf,
    pub run_id: Option<String>,
    pub category: RunCategory,
    pub instrument: InstrumentKind,
    pub state: Option<RunState>,
    pub flags: RunFlags,
    pub document: Option<DocumentStatus>,
    pub problem: Option<String>,
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.run_id.as_deref().unwrap_or("-");
        let state = self
            .state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let doc = self.document.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:<5} {:<10} {:<45} {:<24} doc={:<8} seq_done={} sync={} qc_started={} qc_done={} transferred={}",
            self.category.to_string(),
            self.instrument.to_string(),
            id,
            state,
            doc,
            self.flags.sequencing_done,
            self.flags.sync_finished,
            self.flags.qc_started,
            self.flags.qc_done,
            self.flags.transferred,
        )?;
        if let Some(problem) = &self.problem {
            write!(f, " ({problem})")?;
        }
        Ok(())
    }
}

pub struct Invocation<'a> {
    cfg: &'a ConfigFile,
    deps: Collaborators<'a>,
    samplesheet: Option<&'a Path>,
}

impl<'a> Invocation<'a> {
    pub fn new(cfg: &'a ConfigFile, deps: Collaborators<'a>) -> Self {
        Self {
            cfg,
            deps,
            samplesheet: None,
        }
    }

    /// Sample sheet supplied on the command line for QC runs.
    pub fn with_samplesheet(mut self, samplesheet: Option<&'a Path>) -> Self {
        self.samplesheet = samplesheet;
        self
    }

    /// Process every located run of the selected categories, sequentially.
    pub async fn process_all(&self, filter: CategoryArg) -> Vec<RunOutcome> {
        let located = locate_all(self.deps.fs, self.cfg, filter);
        info!(runs = located.len(), "located run directories");

        let mut outcomes = Vec::with_capacity(located.len());
        for loc in &located {
            outcomes.push(self.process_located(loc, Mode::Full).await);
        }
        outcomes
    }

    /// Process one explicitly named run directory.
    pub async fn process_path(&self, path: &Path, mode: Mode) -> Result<RunOutcome> {
        let located = resolve_explicit(self.deps.fs, self.cfg, path)?;
        Ok(self.process_located(&located, mode).await)
    }

    pub async fn process_located(&self, located: &Located, mode: Mode) -> RunOutcome {
        let span = info_span!(
            "run",
            path = %located.path.display(),
            category = %located.category,
            instrument = %located.instrument,
        );
        self.process_inner(located, mode).instrument(span).await
    }

    async fn process_inner(&self, located: &Located, mode: Mode) -> RunOutcome {
        let mut outcome = RunOutcome::new(located);

        let prepared = match self.prepare(located) {
            Ok(p) => p,
            Err(err) => {
                self.reject(located, &err).await;
                outcome.errors.push(err);
                return outcome;
            }
        };
        let Prepared {
            run,
            mut log,
            snapshot,
            track_status,
        } = prepared;
        let id = run.run().id.clone();
        outcome.run_id = Some(id.to_string());

        let state = run.describe_state(&snapshot, &log);
        outcome.initial_state = Some(state);
        info!(run_id = %id, %state, "evaluated run");

        if !snapshot.present && state != RunState::Archived {
            let err = RunsyncError::MissingArtifact(format!(
                "run directory {} is gone but no transfer is recorded",
                run.run().dir.display()
            ));
            self.notify_error(&id, &err).await;
            outcome.errors.push(err);
            return outcome;
        }

        for step in plan(state, run.run().category, track_status, mode) {
            outcome.steps.push(step);
            let proceed = match step {
                Step::SyncStatus => self.sync_status(run.run(), &snapshot, &mut outcome).await,
                Step::AdvanceQc => self.advance_qc(run.run(), &snapshot, state, &mut outcome).await,
                Step::Transfer => {
                    let pipeline = TransferPipeline::new(self.deps.fs, self.deps.agent, self.deps.notifier);
                    let result = pipeline.execute(run.as_ref(), state, &mut log).await;
                    debug!(run_id = %id, ?result, "transfer pipeline finished");
                    if let Some(e) = result.into_error() {
                        if e.is_retryable() {
                            info!(run_id = %id, "transfer will be retried on the next invocation");
                        } else {
                            warn!(run_id = %id, "run needs an operator before it is copied again");
                        }
                        outcome.errors.push(e);
                    }
                    true
                }
            };
            if !proceed {
                break;
            }
        }

        outcome.final_state = Some(self.reevaluate(run.as_ref(), &log, state));
        if outcome.final_state != outcome.initial_state {
            info!(run_id = %id, from = %state, to = ?outcome.final_state, "run advanced");
        }
        outcome
    }

    /// Report a directory that could not be turned into a run. Conditions
    /// that will not clear by themselves (a bad run name) are mailed once and
    /// only logged afterwards.
    async fn reject(&self, located: &Located, err: &RunsyncError) {
        let marker = located.path.join(REJECTED_MARKER);
        if !err.is_retryable() && self.deps.fs.is_file(&marker) {
            info!(error = %err, "not a run directory; reported earlier, skipping");
            return;
        }

        warn!(error = %err, "skipping directory");
        self.deps
            .notifier
            .notify(&Notification::new(
                format!("Run processed with errors: {}", located.path.display()),
                format!("{} could not be processed.\n{err}", located.path.display()),
            ))
            .await;
        if !err.is_retryable() {
            if let Err(e) = self.deps.fs.write(&marker, err.to_string().as_bytes()) {
                warn!(error = %e, "could not record that the directory was reported");
            }
        }
    }

    /// Turn a located directory into a validated run with its inputs loaded.
    fn prepare(&self, located: &Located) -> Result<Prepared> {
        let run = Run::from_located(located)?;
        let cat_cfg = self.cfg.category(located.category).ok_or_else(|| {
            RunsyncError::ConfigError(format!("category {} is not configured", located.category))
        })?;
        let settings: InstrumentSection = cat_cfg
            .instrument(located.instrument)
            .cloned()
            .ok_or_else(|| {
                RunsyncError::ConfigError(format!(
                    "instrument {} is not configured for {}",
                    located.instrument, located.category
                ))
            })?;
        let run = instrument_run(run, settings)?;

        let log = TransferLog::load(self.deps.fs, run.transfer_log_path())?;
        let layout = self.qc_layout(located.category);
        let snapshot = RunSnapshot::capture(self.deps.fs, &run.run().dir, layout.as_ref())?;

        Ok(Prepared {
            run,
            log,
            snapshot,
            track_status: cat_cfg.track_status,
        })
    }

    fn qc_layout(&self, category: RunCategory) -> Option<QcLayout> {
        match category {
            RunCategory::Qc => self.cfg.qc.as_ref().map(QcLayout::from),
            RunCategory::User | RunCategory::Delivery => None,
        }
    }

    async fn sync_status(&self, run: &Run, snapshot: &RunSnapshot, outcome: &mut RunOutcome) -> bool {
        let Some(store) = self.deps.store else {
            debug!(run_id = %run.id, "no status store configured");
            return true;
        };
        let report_types = self.cfg.report_types();
        let shared_dir = self.cfg.reports.as_ref().map(|r| r.shared_dir.as_str());
        let sync = Synchronizer::new(self.deps.fs, store, self.deps.agent, &report_types, shared_dir);

        let report = sync.reconcile(run, snapshot).await;
        if let Some(err) = report.publish_error {
            self.deps
                .notifier
                .notify(&Notification::processed_with_errors(
                    &run.id,
                    format!(
                        "An error occurred while publishing the report of run {}; \
                         it will be retried on the next invocation.\n{err}",
                        run.id
                    ),
                ))
                .await;
            outcome.errors.push(err);
        }
        match report.sync_error {
            Some(err) => {
                self.deps
                    .notifier
                    .notify(&Notification::processed_with_errors(
                        &run.id,
                        format!(
                            "An error occurred when updating the status store with run {}.\n{err}",
                            run.id
                        ),
                    ))
                    .await;
                outcome.errors.push(err);
                false
            }
            None => {
                info!(run_id = %run.id, "status update successful");
                true
            }
        }
    }

    async fn advance_qc(
        &self,
        run: &Run,
        snapshot: &RunSnapshot,
        state: RunState,
        outcome: &mut RunOutcome,
    ) -> bool {
        let (Some(qc), Some(demux), Some(lookup)) =
            (self.cfg.qc.as_ref(), self.deps.demux, self.deps.samplesheets)
        else {
            let err = RunsyncError::ConfigError("QC run found but [qc] is not configured".to_string());
            self.notify_error(&run.id, &err).await;
            outcome.errors.push(err);
            return false;
        };

        let trigger = QcTrigger::new(self.deps.fs, qc, lookup, demux, self.deps.notifier)
            .with_samplesheet(self.samplesheet);
        match trigger.advance(run, snapshot, state).await {
            Ok(QcProgress::Done { results_error, .. }) => {
                if let Some(err) = results_error {
                    outcome.errors.push(err);
                }
                true
            }
            Ok(QcProgress::Failed { status, .. }) => {
                outcome
                    .errors
                    .push(RunsyncError::Other(anyhow::anyhow!("QC exited with {status:?}")));
                false
            }
            Ok(progress) => {
                debug!(run_id = %run.id, ?progress, "QC in progress");
                false
            }
            Err(err) => {
                self.notify_error(&run.id, &err).await;
                outcome.errors.push(err);
                false
            }
        }
    }

    fn reevaluate(&self, run: &dyn InstrumentRun, log: &TransferLog, fallback: RunState) -> RunState {
        let layout = self.qc_layout(run.run().category);
        match RunSnapshot::capture(self.deps.fs, &run.run().dir, layout.as_ref()) {
            Ok(snapshot) => run.describe_state(&snapshot, log),
            Err(e) => {
                warn!(run_id = %run.run().id, error = %e, "could not re-read run directory");
                fallback
            }
        }
    }

    async fn notify_error(&self, run_id: &crate::run::RunId, err: &RunsyncError) {
        self.deps
            .notifier
            .notify(&Notification::processed_with_errors(
                run_id,
                format!("An error occurred while processing run {run_id}.\n{err}"),
            ))
            .await;
    }

    /// Evaluate every located run without side effects.
    pub fn status(&self, filter: CategoryArg) -> Vec<StatusLine> {
        locate_all(self.deps.fs, self.cfg, filter)
            .iter()
            .map(|loc| self.status_line(loc))
            .collect()
    }

    fn status_line(&self, located: &Located) -> StatusLine {
        let mut line = StatusLine {
            path: located.path.clone(),
            run_id: None,
            category: located.category,
            instrument: located.instrument,
            state: None,
            flags: RunFlags::default(),
            document: None,
            problem: None,
        };
        let prepared = match self.prepare(located) {
            Ok(p) => p,
            Err(err) => {
                line.problem = Some(err.to_string());
                return line;
            }
        };
        let run = prepared.run.run();
        line.run_id = Some(run.id.to_string());
        let transferred = prepared.run.is_transferred(&prepared.log);
        line.state = Some(prepared.run.describe_state(&prepared.snapshot, &prepared.log));
        line.flags = RunFlags::derive(&prepared.snapshot, transferred);
        if let Some(store) = self.deps.store {
            match store.status(&run.id) {
                Ok(doc) => line.document = doc,
                Err(err) => line.problem = Some(err.to_string()),
            }
        }
        line
    }
}

struct Prepared {
    run: Box<dyn InstrumentRun>,
    log: TransferLog,
    snapshot: RunSnapshot,
    track_status: bool,
}

/// Counts logged at the end of an invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvocationSummary {
    pub runs: usize,
    pub with_errors: usize,
    pub advanced: usize,
    pub archived: usize,
}

impl InvocationSummary {
    pub fn from_outcomes(outcomes: &[RunOutcome]) -> Self {
        let mut summary = Self {
            runs: outcomes.len(),
            ..Self::default()
        };
        for o in outcomes {
            if !o.is_clean() {
                summary.with_errors += 1;
            }
            if o.final_state != o.initial_state {
                summary.advanced += 1;
            }
            if o.final_state == Some(RunState::Archived) && o.initial_state != Some(RunState::Archived) {
                summary.archived += 1;
            }
        }
        summary
    }
}
