// src/qc/mod.rs

//! Local QC demultiplexing for QC-category runs.
//!
//! The job is launched once, detached, and then only observed through the
//! markers it leaves in the run directory (see [`crate::run::snapshot`]).

pub mod launcher;
pub mod samplesheet;
pub mod trigger;

use std::path::PathBuf;

use crate::run::{QcLayout, Run, RunId};

pub use launcher::{Demultiplexer, ShellDemultiplexer};
pub use samplesheet::{DirSampleSheetLookup, SampleSheetLookup};
pub use trigger::{QcProgress, QcTrigger};

/// Everything needed to start one demultiplexing job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcJob {
    pub run_id: RunId,
    pub run_dir: PathBuf,
    pub samplesheet: PathBuf,
    pub output_dir: PathBuf,
    pub exit_status_path: PathBuf,
}

impl QcJob {
    pub fn new(run: &Run, layout: &QcLayout, samplesheet: PathBuf) -> Self {
        Self {
            run_id: run.id.clone(),
            run_dir: run.dir.clone(),
            samplesheet,
            output_dir: layout.output_dir(&run.dir),
            exit_status_path: layout.exit_status_path(&run.dir),
        }
    }
}
