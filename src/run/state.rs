// src/run/state.rs

//! Lifecycle state of a run, derived purely from a [`RunSnapshot`] and the
//! transfer log. Evaluation has no side effects and can be repeated freely.

use std::fmt;

use serde::Serialize;

use crate::run::snapshot::{ExitStatus, RunSnapshot};
use crate::types::RunCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    SequencingInProgress,
    SequencingDone,
    /// QC run: sequencing done, demultiplexing not launched yet.
    QcPending,
    /// QC run: output directory exists, no exit-status marker yet.
    QcRunning,
    QcDone,
    /// Needs manual intervention; never retried automatically.
    QcFailed(ExitStatus),
    TransferPending,
    /// Copied, but the transfer log could not record it. Blocked until an
    /// operator records the transfer or removes the marker.
    TransferUnlogged,
    Transferred,
    Archived,
}

impl RunState {
    /// Position in the lifecycle. QC outcomes share a rank.
    pub fn rank(self) -> u8 {
        match self {
            RunState::SequencingInProgress => 0,
            RunState::SequencingDone => 1,
            RunState::QcPending => 2,
            RunState::QcRunning => 3,
            RunState::QcDone | RunState::QcFailed(_) => 4,
            RunState::TransferPending => 5,
            RunState::TransferUnlogged => 6,
            RunState::Transferred => 7,
            RunState::Archived => 8,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Archived | RunState::QcFailed(_))
    }

    pub fn is_sequencing_done(self) -> bool {
        self != RunState::SequencingInProgress
    }

    /// Ready for the copy to the cluster.
    pub fn is_transfer_eligible(self) -> bool {
        matches!(self, RunState::TransferPending | RunState::QcDone)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::SequencingInProgress => f.write_str("sequencing_in_progress"),
            RunState::SequencingDone => f.write_str("sequencing_done"),
            RunState::QcPending => f.write_str("qc_pending"),
            RunState::QcRunning => f.write_str("qc_running"),
            RunState::QcDone => f.write_str("qc_done"),
            RunState::QcFailed(ExitStatus::Code(c)) => write!(f, "qc_failed(exit {c})"),
            RunState::QcFailed(ExitStatus::Unreadable) => f.write_str("qc_failed(unreadable exit status)"),
            RunState::TransferPending => f.write_str("transfer_pending"),
            RunState::TransferUnlogged => f.write_str("transferred_unlogged"),
            RunState::Transferred => f.write_str("transferred"),
            RunState::Archived => f.write_str("archived"),
        }
    }
}

/// Compute the lifecycle state of a run.
///
/// Tie-breaks:
/// - a successful transfer-log entry wins over every marker;
/// - an unlogged copy wins over everything but the log;
/// - the summary file alone decides whether sequencing is done;
/// - for QC runs the exit-status marker wins over the output directory;
/// - delivery runs need no sync marker, they write their own indicator.
pub fn evaluate(snapshot: &RunSnapshot, transferred: bool, category: RunCategory) -> RunState {
    if transferred {
        return if snapshot.present {
            RunState::Transferred
        } else {
            RunState::Archived
        };
    }

    if snapshot.has_transferred_unlogged() {
        return RunState::TransferUnlogged;
    }

    if !snapshot.has_summary() {
        return RunState::SequencingInProgress;
    }

    match category {
        RunCategory::User => {
            if snapshot.has_sync_finished() {
                RunState::TransferPending
            } else {
                RunState::SequencingDone
            }
        }
        RunCategory::Delivery => RunState::TransferPending,
        RunCategory::Qc => {
            let qc = snapshot.qc.clone().unwrap_or_default();
            match qc.exit_status {
                Some(status) if status.is_success() => RunState::QcDone,
                Some(status) => RunState::QcFailed(status),
                None if qc.output_dir_present => RunState::QcRunning,
                None => RunState::QcPending,
            }
        }
    }
}

/// Boolean view of the same facts, for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunFlags {
    pub sequencing_done: bool,
    pub sync_finished: bool,
    pub qc_started: bool,
    pub qc_done: bool,
    pub transferred: bool,
    pub archived: bool,
}

impl RunFlags {
    pub fn derive(snapshot: &RunSnapshot, transferred: bool) -> Self {
        let qc = snapshot.qc.clone().unwrap_or_default();
        Self {
            sequencing_done: snapshot.has_summary(),
            sync_finished: snapshot.has_sync_finished(),
            qc_started: qc.output_dir_present || qc.exit_status.is_some(),
            qc_done: qc.exit_status.is_some_and(ExitStatus::is_success),
            transferred,
            archived: transferred && !snapshot.present,
        }
    }
}
