// src/run/mod.rs

//! Run directories and everything derived from them.
//!
//! - [`id`] parses and validates run directory names.
//! - [`locator`] finds candidate run directories under the data dirs.
//! - [`snapshot`] captures the marker files of one run.
//! - [`state`] turns a snapshot plus the transfer log into a [`RunState`].
//!
//! A [`Run`] carries no lifecycle state of its own; every flag is recomputed
//! from the filesystem and the transfer log on each invocation.

pub mod id;
pub mod locator;
pub mod snapshot;
pub mod state;

use std::fmt;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::config::InstrumentSection;
use crate::errors::{Result, RunsyncError};
use crate::fs::FileSystem;
use crate::transfer::agent::TransferAgent;
use crate::transfer::archive::archive_run;
use crate::transfer::log::TransferLog;
use crate::types::{BoxFuture, InstrumentKind, RunCategory};

pub use id::RunId;
pub use locator::Located;
pub use snapshot::{QcLayout, RunSnapshot};
pub use state::{evaluate, RunFlags, RunState};

/// Project used for archive grouping when nothing better is known.
pub const UNASSIGNED_PROJECT: &str = "unassigned";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: RunId,
    /// Absolute path of the run directory in the active tree.
    pub dir: PathBuf,
    /// The configured data dir the run was found under.
    pub data_dir: PathBuf,
    pub instrument: InstrumentKind,
    pub category: RunCategory,
}

impl Run {
    /// Build a run from a directory path, validating its name.
    pub fn new(
        dir: PathBuf,
        data_dir: PathBuf,
        instrument: InstrumentKind,
        category: RunCategory,
    ) -> Result<Self> {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RunsyncError::ValidationFailure(format!("{:?} has no usable name", dir)))?;
        let id = RunId::parse(name)?;
        Ok(Self {
            id,
            dir,
            data_dir,
            instrument,
            category,
        })
    }

    pub fn from_located(located: &Located) -> Result<Self> {
        Self::new(
            located.path.clone(),
            located.data_dir.clone(),
            located.instrument,
            located.category,
        )
    }

    fn relative_components(&self) -> Vec<String> {
        self.dir
            .strip_prefix(&self.data_dir)
            .map(|rel| {
                rel.components()
                    .filter_map(|c| match c {
                        Component::Normal(s) => s.to_str().map(str::to_string),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The directory grouping this run below the data dir, for nested layouts.
    pub fn project_dir(&self) -> Option<PathBuf> {
        let comps = self.relative_components();
        if comps.len() > 1 {
            Some(self.data_dir.join(&comps[0]))
        } else {
            None
        }
    }

    /// The run directory relative to its data dir, e.g.
    /// `<experiment>/<sample>/<run_id>` for nested layouts.
    pub fn relative_path(&self) -> PathBuf {
        let comps = self.relative_components();
        if comps.is_empty() {
            PathBuf::from(self.id.as_str())
        } else {
            comps.iter().collect()
        }
    }

    /// Where the run sits inside its project once archived.
    pub fn path_within_project(&self) -> PathBuf {
        let comps = self.relative_components();
        if comps.len() > 1 {
            comps[1..].iter().collect()
        } else {
            PathBuf::from(self.id.as_str())
        }
    }

    /// Project identifier used to group archived runs.
    ///
    /// Nested layouts use the first directory below the data dir; flat layouts
    /// use the first component of `run_path.txt`.
    pub fn project_id(&self, fs: &dyn FileSystem) -> String {
        let comps = self.relative_components();
        if comps.len() > 1 {
            return comps[0].clone();
        }

        let run_path = self.dir.join(snapshot::RUN_PATH_FILE);
        match fs.read_to_string(&run_path) {
            Ok(contents) => contents
                .trim()
                .split('/')
                .find(|c| !c.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| UNASSIGNED_PROJECT.to_string()),
            Err(e) => {
                debug!(run_id = %self.id, error = %e, "no run_path.txt; project unassigned");
                UNASSIGNED_PROJECT.to_string()
            }
        }
    }
}

/// The capability set the pipeline needs from a run, one implementation per
/// instrument family.
pub trait InstrumentRun: Send + Sync + fmt::Debug {
    fn run(&self) -> &Run;
    fn settings(&self) -> &InstrumentSection;
    fn display_name(&self) -> &'static str;

    fn transfer_log_path(&self) -> &Path {
        &self.settings().transfer_log
    }

    fn is_transferred(&self, log: &TransferLog) -> bool {
        log.is_transferred(&self.run().id)
    }

    fn describe_state(&self, snapshot: &RunSnapshot, log: &TransferLog) -> RunState {
        evaluate(snapshot, self.is_transferred(log), self.run().category)
    }

    /// Copy the run directory to its cluster destination.
    fn transfer<'a>(&'a self, agent: &'a dyn TransferAgent) -> BoxFuture<'a, Result<()>> {
        agent.transfer_dir(&self.run().dir, &self.settings().destination)
    }

    /// Move the run out of the active tree. Returns the archived location.
    fn archive(&self, fs: &dyn FileSystem) -> Result<PathBuf> {
        archive_run(fs, self.run(), &self.settings().archive_dir)
    }
}

#[derive(Debug, Clone)]
pub struct PromethionRun {
    run: Run,
    settings: InstrumentSection,
}

impl InstrumentRun for PromethionRun {
    fn run(&self) -> &Run {
        &self.run
    }

    fn settings(&self) -> &InstrumentSection {
        &self.settings
    }

    fn display_name(&self) -> &'static str {
        "PromethION"
    }
}

#[derive(Debug, Clone)]
pub struct MinionRun {
    run: Run,
    settings: InstrumentSection,
}

impl InstrumentRun for MinionRun {
    fn run(&self) -> &Run {
        &self.run
    }

    fn settings(&self) -> &InstrumentSection {
        &self.settings
    }

    fn display_name(&self) -> &'static str {
        "MinION"
    }
}

/// Wrap a run in the implementation for its instrument.
pub fn instrument_run(run: Run, settings: InstrumentSection) -> Result<Box<dyn InstrumentRun>> {
    if run.category == RunCategory::Qc && !run.instrument.supports_qc() {
        return Err(RunsyncError::ValidationFailure(format!(
            "run {} is a {} run but QC is only done on MinION",
            run.id, run.instrument
        )));
    }
    Ok(match run.instrument {
        InstrumentKind::Promethion => Box::new(PromethionRun { run, settings }),
        InstrumentKind::Minion => Box::new(MinionRun { run, settings }),
    })
}
