// tests/locating_runs.rs

mod common;
use crate::common::Harness;

use std::error::Error;
use std::fs;

use runsync::engine::Mode;
use runsync::errors::RunsyncError;
use runsync::run::RunState;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn missing_data_dir_does_not_stop_other_roots() -> TestResult {
    let h = Harness::new();
    fs::remove_dir(h.facility.qc_dir())?;
    h.facility.user_run("20240131_1702_1A_PAM12345_a1b2c3d4");

    let outcomes = h.process_all().await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].initial_state, Some(RunState::SequencingInProgress));
    Ok(())
}

#[tokio::test]
async fn unrelated_directories_are_skipped_silently() -> TestResult {
    let h = Harness::new();
    fs::create_dir_all(h.facility.promethion_dir().join("scratch"))?;
    fs::create_dir_all(h.facility.promethion_dir().join("nosync/20230101_1000_1A_PAM00001_aaaa"))?;
    fs::write(h.facility.promethion_dir().join("20240101_notes.txt"), "")?;

    let outcomes = h.process_all().await;
    assert!(outcomes.is_empty());
    assert!(h.notifier.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn dated_directory_with_bad_name_is_reported() -> TestResult {
    let h = Harness::new();
    let bad_dir = h.facility.promethion_dir().join("20240131_test-run");
    fs::create_dir_all(&bad_dir)?;
    h.facility
        .user_run("20240131_1702_1A_PAM12345_a1b2c3d4")
        .with_metadata("P12345/P12345_101/20240131_1702_1A_PAM12345_a1b2c3d4");

    let outcomes = h.process_all().await;
    assert_eq!(outcomes.len(), 2);

    let bad = outcomes
        .iter()
        .find(|o| o.run_id.is_none())
        .expect("bad directory has an outcome");
    assert!(matches!(bad.errors.as_slice(), [RunsyncError::ValidationFailure(_)]));
    // the other run was still processed
    assert!(outcomes.iter().any(|o| o.run_id.is_some() && o.initial_state.is_some()));

    let errors = h.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].subject.contains("20240131_test-run"));
    assert!(bad_dir.join(".runsync_rejected").is_file());

    // reported once; later invocations only log it
    for _ in 0..2 {
        let outcomes = h.process_all().await;
        let bad = outcomes
            .iter()
            .find(|o| o.run_id.is_none())
            .expect("bad directory still has an outcome");
        assert!(matches!(bad.errors.as_slice(), [RunsyncError::ValidationFailure(_)]));
    }
    assert_eq!(h.notifier.errors().len(), 1);
    Ok(())
}

#[tokio::test]
async fn qc_runs_are_found_three_levels_down() -> TestResult {
    let h = Harness::new();
    h.facility.qc_run("QC_2024", "sampleA", "20240201_0900_MN21456_FAX12345_deadbeef");
    h.facility.qc_run("QC_2024", "sampleB", "20240202_0900_MN21456_FAX12346_beefdead");
    // too shallow for a QC run
    fs::create_dir_all(h.facility.qc_dir().join("20240203_0900_MN21456_FAX12347_feedf00d"))?;

    let outcomes = h.process_all().await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| o.initial_state == Some(RunState::SequencingInProgress)));
    Ok(())
}

#[tokio::test]
async fn explicit_path_outside_data_dirs_is_an_error() -> TestResult {
    let h = Harness::new();
    let elsewhere = h.facility.root().join("elsewhere/20240131_1702_1A_PAM12345_a1b2c3d4");
    fs::create_dir_all(&elsewhere)?;

    let err = h.process_path(&elsewhere, Mode::Full).await.unwrap_err();
    assert!(matches!(err, RunsyncError::ValidationFailure(msg) if msg.contains("not inside")));

    let err = h
        .process_path(&h.facility.root().join("does/not/exist"), Mode::Full)
        .await
        .unwrap_err();
    assert!(matches!(err, RunsyncError::ValidationFailure(_)));
    Ok(())
}

#[tokio::test]
async fn explicit_path_resolves_category_from_data_dir() -> TestResult {
    let h = Harness::new();
    let run = h
        .facility
        .qc_run("QC_2024", "sampleA", "20240201_0900_MN21456_FAX12345_deadbeef");
    run.finish_sequencing();

    let outcome = h.process_path(run.path(), Mode::Full).await?;
    assert_eq!(outcome.category, runsync::types::RunCategory::Qc);
    assert_eq!(outcome.initial_state, Some(RunState::QcPending));
    Ok(())
}
