// tests/delivery_runs.rs

mod common;
use crate::common::Harness;

use std::error::Error;
use std::fs;

use runsync::engine::Step;
use runsync::errors::RunsyncError;
use runsync::run::RunState;
use runsync::transfer::TransferLog;
use runsync_test_utils::builders::RunDir;
use runsync_test_utils::fakes::AgentCall;

type TestResult = Result<(), Box<dyn Error>>;

const RUN: &str = "20240131_1702_MN21456_FAX12345_0badcafe";

fn delivery_only() -> Harness {
    Harness::with_config(|c| c.without_user_runs().without_qc_runs().with_delivery_runs())
}

fn sequencing_run(h: &Harness) -> RunDir {
    let run = h.facility.delivery_run("EXP1", "sample1", RUN);
    run.write("pod5/batch_0.pod5", "reads\n");
    run
}

#[tokio::test]
async fn ongoing_run_is_mirrored_without_a_log_record() -> TestResult {
    let h = delivery_only();
    let run = sequencing_run(&h);

    let outcomes = h.process_all().await;
    let o = &outcomes[0];
    assert!(o.is_clean(), "{:?}", o.errors);
    assert_eq!(o.initial_state, Some(RunState::SequencingInProgress));
    assert!(o.steps.contains(&Step::Transfer));
    assert_eq!(o.final_state, Some(RunState::SequencingInProgress));

    let mirrored = h.facility.nas_dir().join(RUN);
    assert!(mirrored.join("pod5/batch_0.pod5").is_file());
    assert_eq!(
        fs::read_to_string(run.path().join("run_path.txt"))?,
        format!("EXP1/sample1/{RUN}")
    );
    assert!(!h.facility.delivery_log().exists());
    assert!(!mirrored.join(".sync_finished").exists());
    assert!(h.notifier.sent().is_empty());
    assert!(run.exists());
    Ok(())
}

#[tokio::test]
async fn finished_run_is_handed_over_and_archived() -> TestResult {
    let h = delivery_only();
    let run = sequencing_run(&h);
    h.process_all().await;

    run.finish_sequencing();
    let outcomes = h.process_all().await;
    let o = &outcomes[0];
    assert!(o.is_clean(), "{:?}", o.errors);
    assert_eq!(o.initial_state, Some(RunState::TransferPending));
    assert_eq!(o.final_state, Some(RunState::Archived));

    assert_eq!(h.agent.dir_transfers(), 2);
    let indicator = h.facility.nas_dir().join(RUN).join(".sync_finished");
    assert!(indicator.is_file());
    assert!(matches!(
        h.agent.calls().last(),
        Some(AgentCall::File { destination, .. }) if destination.ends_with(&format!("{RUN}/.sync_finished"))
    ));

    let log = TransferLog::load(h.fs.as_ref(), &h.facility.delivery_log())?;
    assert!(log.is_transferred(&run.id()));

    assert!(!run.exists());
    assert!(h
        .facility
        .delivery_archive()
        .join("EXP1/sample1")
        .join(RUN)
        .is_dir());
    // emptied experiment dirs are pruned
    assert!(!h.facility.delivery_dir().join("EXP1").exists());

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(!sent[0].is_error());
    assert_eq!(sent[0].subject, format!("Run successfully processed: {RUN}"));
    Ok(())
}

#[tokio::test]
async fn failed_mirror_is_reported_and_retried() -> TestResult {
    let h = delivery_only();
    let run = sequencing_run(&h);

    h.agent.fail_dir_transfers(true);
    let outcomes = h.process_all().await;
    assert!(matches!(outcomes[0].errors.as_slice(), [RunsyncError::TransferFailure(_)]));
    assert_eq!(outcomes[0].final_state, Some(RunState::SequencingInProgress));
    assert_eq!(h.notifier.errors().len(), 1);
    // a failed mirror is not a failed transfer
    assert!(!h.facility.delivery_log().exists());

    h.agent.fail_dir_transfers(false);
    let outcomes = h.process_all().await;
    assert!(outcomes[0].is_clean());
    assert_eq!(h.agent.dir_transfers(), 2);
    assert!(h.facility.nas_dir().join(RUN).is_dir());
    assert!(run.exists());
    Ok(())
}

#[tokio::test]
async fn failed_indicator_push_keeps_the_run() -> TestResult {
    let h = delivery_only();
    let run = sequencing_run(&h);
    run.finish_sequencing();

    h.agent.fail_file_copies(true);
    let outcomes = h.process_all().await;
    assert_eq!(outcomes[0].errors.len(), 1);
    assert_eq!(outcomes[0].final_state, Some(RunState::TransferPending));
    assert!(run.exists());
    assert_eq!(h.notifier.errors().len(), 1);

    h.agent.fail_file_copies(false);
    let outcomes = h.process_all().await;
    assert_eq!(outcomes[0].final_state, Some(RunState::Archived));
    assert!(h.facility.nas_dir().join(RUN).join(".sync_finished").is_file());
    Ok(())
}
