// src/engine/plan.rs

//! Pure step planning.
//!
//! Given an evaluated [`RunState`], decide which steps the IO shell
//! (`engine::invocation`) should attempt for a run, in order. No IO, no
//! async, so every combination is cheap to test.

use std::fmt;

use crate::run::RunState;
use crate::types::RunCategory;

/// What an invocation is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Sync status, drive QC, transfer and archive.
    Full,
    /// Only reconcile the status store.
    StatusOnly,
}

/// One unit of work for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SyncStatus,
    AdvanceQc,
    Transfer,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::SyncStatus => f.write_str("sync-status"),
            Step::AdvanceQc => f.write_str("advance-qc"),
            Step::Transfer => f.write_str("transfer"),
        }
    }
}

/// Steps to attempt, in order. Each step may halt the ones after it.
pub fn plan(state: RunState, category: RunCategory, track_status: bool, mode: Mode) -> Vec<Step> {
    let mut steps = Vec::new();

    // Nothing left on disk to look at.
    if state == RunState::Archived {
        return steps;
    }

    if track_status {
        steps.push(Step::SyncStatus);
    }
    if mode == Mode::StatusOnly {
        return steps;
    }

    if category == RunCategory::Qc
        && matches!(
            state,
            RunState::QcPending | RunState::QcRunning | RunState::QcDone | RunState::QcFailed(_)
        )
    {
        steps.push(Step::AdvanceQc);
    }

    // Transferred retries the archive and an unlogged copy is escalated
    // again; neither reaches the agent.
    let mirror = category == RunCategory::Delivery && state == RunState::SequencingInProgress;
    if state.is_transfer_eligible()
        || mirror
        || matches!(state, RunState::Transferred | RunState::TransferUnlogged)
    {
        steps.push(Step::Transfer);
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::snapshot::ExitStatus;

    #[test]
    fn user_run_steps() {
        assert_eq!(
            plan(RunState::SequencingInProgress, RunCategory::User, true, Mode::Full),
            vec![Step::SyncStatus]
        );
        assert_eq!(
            plan(RunState::TransferPending, RunCategory::User, true, Mode::Full),
            vec![Step::SyncStatus, Step::Transfer]
        );
        assert_eq!(
            plan(RunState::TransferPending, RunCategory::User, false, Mode::Full),
            vec![Step::Transfer]
        );
    }

    #[test]
    fn transferred_run_only_retries_archive() {
        assert_eq!(
            plan(RunState::Transferred, RunCategory::User, false, Mode::Full),
            vec![Step::Transfer]
        );
        assert!(plan(RunState::Archived, RunCategory::User, true, Mode::Full).is_empty());
    }

    #[test]
    fn qc_run_steps() {
        assert_eq!(
            plan(RunState::QcPending, RunCategory::Qc, false, Mode::Full),
            vec![Step::AdvanceQc]
        );
        assert_eq!(
            plan(RunState::QcDone, RunCategory::Qc, false, Mode::Full),
            vec![Step::AdvanceQc, Step::Transfer]
        );
        assert_eq!(
            plan(RunState::QcFailed(ExitStatus::Code(1)), RunCategory::Qc, false, Mode::Full),
            vec![Step::AdvanceQc]
        );
        assert!(plan(RunState::SequencingInProgress, RunCategory::Qc, false, Mode::Full).is_empty());
    }

    #[test]
    fn unlogged_run_goes_back_to_the_pipeline() {
        assert_eq!(
            plan(RunState::TransferUnlogged, RunCategory::User, false, Mode::Full),
            vec![Step::Transfer]
        );
        assert!(!plan(RunState::TransferUnlogged, RunCategory::User, false, Mode::StatusOnly)
            .contains(&Step::Transfer));
    }

    #[test]
    fn delivery_runs_are_mirrored_while_sequencing() {
        assert_eq!(
            plan(RunState::SequencingInProgress, RunCategory::Delivery, false, Mode::Full),
            vec![Step::Transfer]
        );
        assert_eq!(
            plan(RunState::TransferPending, RunCategory::Delivery, true, Mode::Full),
            vec![Step::SyncStatus, Step::Transfer]
        );
        assert!(plan(RunState::SequencingInProgress, RunCategory::User, false, Mode::Full).is_empty());
    }

    #[test]
    fn status_only_mode() {
        assert_eq!(
            plan(RunState::QcDone, RunCategory::Qc, true, Mode::StatusOnly),
            vec![Step::SyncStatus]
        );
    }
}
