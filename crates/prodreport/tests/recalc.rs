mod common;

use std::path::Path;

use common::{quick_processes, CountingTerminator, RecordingOffice};
use pretty_assertions::assert_eq;
use prodreport::{recalculate_report, PipelineError, RecalcConfig, RecalcDriver, RecalcState};
use prodreport_core::AutomationError;

const REPORT: &str = "/srv/porocila/poročanje proizvodnje2025.xlsm";

fn policy(attempts: u32, continue_on_failure: bool) -> RecalcConfig {
    RecalcConfig {
        attempts,
        retry_delay_ms: 0,
        continue_on_failure,
    }
}

#[test]
fn test_first_attempt_succeeds() {
    let mut office = RecordingOffice::new();
    let mut processes = CountingTerminator::default();

    let outcome = recalculate_report(
        &mut office,
        &mut processes,
        Path::new(REPORT),
        &policy(3, false),
        &quick_processes(),
    )
    .unwrap();

    assert_eq!(outcome.attempts, 1);
    assert!(outcome.succeeded);
    assert_eq!(
        office.calls,
        vec![
            "launch",
            "open poročanje proizvodnje2025.xlsm",
            "recalculate",
            "save",
            "close",
            "quit"
        ]
    );
    assert_eq!(processes.sweeps, 2);
}

#[test]
fn test_retries_until_success() {
    let mut office = RecordingOffice::new();
    office.recalc_failures = 2;
    let mut processes = CountingTerminator::default();

    let outcome = recalculate_report(
        &mut office,
        &mut processes,
        Path::new(REPORT),
        &policy(3, false),
        &quick_processes(),
    )
    .unwrap();

    assert_eq!(outcome.attempts, 3);
    assert!(outcome.succeeded);
    assert_eq!(office.count("launch"), 3);
    assert_eq!(office.count("quit"), 3);
    assert_eq!(office.count("save"), 1);
    assert_eq!(processes.sweeps, 6);
}

#[test]
fn test_exhausted_attempts_are_fatal() {
    let mut office = RecordingOffice::new();
    office.recalc_failures = 10;
    let mut processes = CountingTerminator::default();

    let err = recalculate_report(
        &mut office,
        &mut processes,
        Path::new(REPORT),
        &policy(3, false),
        &quick_processes(),
    )
    .unwrap_err();

    match err {
        PipelineError::RecalculationFailed { attempts, last } => {
            assert_eq!(attempts, 3);
            assert_eq!(last.to_string(), "Recalculate failed: Excel is busy");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(office.count("save"), 0);
    assert_eq!(office.count("quit"), 3);
}

#[test]
fn test_continue_on_failure_tolerates_exhaustion() {
    let mut office = RecordingOffice::new();
    office.recalc_failures = 10;
    let mut processes = CountingTerminator::default();

    let outcome = recalculate_report(
        &mut office,
        &mut processes,
        Path::new(REPORT),
        &policy(2, true),
        &quick_processes(),
    )
    .unwrap();

    assert_eq!(outcome.attempts, 2);
    assert!(!outcome.succeeded);
}

#[test]
fn test_failed_launch_is_not_quit() {
    let mut office = RecordingOffice::new();
    office.launch_failures = 1;
    let mut processes = CountingTerminator::default();

    let outcome = recalculate_report(
        &mut office,
        &mut processes,
        Path::new(REPORT),
        &policy(2, false),
        &quick_processes(),
    )
    .unwrap();

    assert_eq!(outcome.attempts, 2);
    // the first attempt never got an application to quit
    assert_eq!(office.count("quit"), 1);
}

#[test]
fn test_driver_moves_forward_only() {
    let mut office = RecordingOffice::new();
    let mut driver = RecalcDriver::new(&mut office);
    assert_eq!(driver.state(), RecalcState::NotStarted);

    let err = driver.save().unwrap_err();
    assert!(matches!(err, AutomationError::Command { .. }));
    assert_eq!(driver.state(), RecalcState::Failed);
    assert!(driver.launch().is_err());
}

#[test]
fn test_driver_walks_every_state() {
    let mut office = RecordingOffice::new();
    let mut driver = RecalcDriver::new(&mut office);

    driver.launch().unwrap();
    assert_eq!(driver.state(), RecalcState::Launched);
    driver.open(Path::new(REPORT)).unwrap();
    assert!(matches!(driver.state(), RecalcState::Opened(_)));
    driver.recalculate().unwrap();
    assert!(matches!(driver.state(), RecalcState::Recalculated(_)));
    driver.save().unwrap();
    assert!(matches!(driver.state(), RecalcState::Saved(_)));
    driver.close().unwrap();
    assert_eq!(driver.state(), RecalcState::Closed);
    assert!(driver.recalculate().is_err());
}
