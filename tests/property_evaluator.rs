use std::collections::BTreeSet;

use proptest::prelude::*;
use runsync::engine::{plan, Mode, Step};
use runsync::run::snapshot::{ExitStatus, QcSnapshot};
use runsync::run::{evaluate, RunSnapshot, RunState};
use runsync::types::RunCategory;

/// Markers a run directory can carry, independent of each other.
#[derive(Debug, Clone, Copy)]
struct Markers {
    present: bool,
    summary: bool,
    sync_finished: bool,
    output_dir: bool,
    exit: Option<i32>,
    transferred: bool,
    unlogged: bool,
}

fn markers() -> impl Strategy<Value = Markers> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        proptest::option::of(0..4i32),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(present, summary, sync_finished, output_dir, exit, transferred, unlogged)| Markers {
            present,
            summary,
            sync_finished,
            output_dir,
            exit,
            transferred,
            unlogged,
        })
}

fn category() -> impl Strategy<Value = RunCategory> {
    prop_oneof![
        Just(RunCategory::User),
        Just(RunCategory::Qc),
        Just(RunCategory::Delivery)
    ]
}

fn snapshot(m: Markers, category: RunCategory) -> RunSnapshot {
    if !m.present {
        return RunSnapshot {
            present: false,
            entries: BTreeSet::new(),
            qc: (category == RunCategory::Qc).then(QcSnapshot::default),
        };
    }
    let mut entries = BTreeSet::from(["run_path.txt".to_string()]);
    if m.summary {
        entries.insert("final_summary_PAM1_abc.txt".to_string());
    }
    if m.sync_finished {
        entries.insert(".sync_finished".to_string());
    }
    if m.unlogged {
        entries.insert(".transferred_unlogged".to_string());
    }
    let qc = (category == RunCategory::Qc).then(|| QcSnapshot {
        output_dir_present: m.output_dir,
        exit_status: m.exit.map(ExitStatus::Code),
        ..QcSnapshot::default()
    });
    RunSnapshot {
        present: true,
        entries,
        qc,
    }
}

fn state(m: Markers, category: RunCategory) -> RunState {
    evaluate(&snapshot(m, category), m.transferred, category)
}

proptest! {
    #[test]
    fn evaluation_is_repeatable(m in markers(), c in category()) {
        prop_assert_eq!(state(m, c), state(m, c));
    }

    #[test]
    fn adding_a_marker_never_moves_a_run_backwards(m in markers(), c in category()) {
        prop_assume!(m.present);
        let before = state(m, c).rank();

        let with_summary = Markers { summary: true, ..m };
        prop_assert!(state(with_summary, c).rank() >= before);

        let with_sync = Markers { sync_finished: true, ..m };
        prop_assert!(state(with_sync, c).rank() >= before);

        let with_output = Markers { output_dir: true, ..m };
        prop_assert!(state(with_output, c).rank() >= before);

        let transferred = Markers { transferred: true, ..m };
        prop_assert!(state(transferred, c).rank() >= before);

        let unlogged = Markers { unlogged: true, ..m };
        prop_assert!(state(unlogged, c).rank() >= before);
    }

    #[test]
    fn transfer_log_decides_transferred_and_archived(m in markers(), c in category()) {
        let s = state(Markers { transferred: true, ..m }, c);
        if m.present {
            prop_assert_eq!(s, RunState::Transferred);
        } else {
            prop_assert_eq!(s, RunState::Archived);
        }
    }

    #[test]
    fn nothing_happens_before_the_summary(m in markers(), c in category()) {
        prop_assume!(!m.transferred && !m.unlogged);
        let s = state(Markers { summary: false, ..m }, c);
        prop_assert_eq!(s, RunState::SequencingInProgress);
    }

    #[test]
    fn only_eligible_runs_are_planned_for_transfer(
        m in markers(),
        c in category(),
        track in any::<bool>(),
    ) {
        let s = state(m, c);
        let steps = plan(s, c, track, Mode::Full);
        if steps.contains(&Step::Transfer) {
            let mirrored = c == RunCategory::Delivery && s == RunState::SequencingInProgress;
            prop_assert!(
                s.is_transfer_eligible()
                    || mirrored
                    || matches!(s, RunState::Transferred | RunState::TransferUnlogged)
            );
        }
        if s == RunState::Archived {
            prop_assert!(steps.is_empty());
        }
        if let RunState::QcFailed(_) = s {
            prop_assert!(!steps.contains(&Step::Transfer));
        }
        prop_assert!(!plan(s, c, track, Mode::StatusOnly).contains(&Step::Transfer));
    }

    #[test]
    fn copied_but_unlogged_run_is_never_eligible(m in markers(), c in category()) {
        prop_assume!(m.present && !m.transferred);
        let s = state(Markers { unlogged: true, ..m }, c);
        prop_assert_eq!(s, RunState::TransferUnlogged);
        prop_assert!(!s.is_transfer_eligible());
    }
}
