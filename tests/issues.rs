mod common;

use std::fs;

use kmc_analysis_rs::{
    detect_issues, detect_issues_from_records, diagnose_loaded, AnalysisWindow, IssueThresholds,
    KmcError, KmcOutput, LoadedRun, RangeType, RunDirectory, WeightMode,
};

#[test]
fn test_steady_run_passes() {
    let dir = tempfile::tempdir().unwrap();
    common::write_run(dir.path(), &common::linear_run(300, 0.0));

    let verdict = detect_issues_from_records(
        &RunDirectory::new(dir.path()),
        AnalysisWindow::full(RangeType::Events),
        &IssueThresholds::default(),
    )
    .unwrap();
    assert!(!verdict.has_issues);
    assert_eq!(verdict.points, 100);
    assert!(verdict.time_r_squared > 0.999);
}

#[test]
fn test_energy_drift_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    common::write_run(dir.path(), &common::linear_run(40, 1e-9));

    let flagged = detect_issues(
        dir.path(),
        AnalysisWindow::full(RangeType::Events),
        &IssueThresholds::default(),
    )
    .unwrap();
    assert!(flagged);

    let relaxed = IssueThresholds {
        energy_slope_threshold: 1e-8,
        ..IssueThresholds::default()
    };
    assert!(!detect_issues(dir.path(), AnalysisWindow::full(RangeType::Events), &relaxed).unwrap());
}

#[test]
fn test_window_uses_event_percentages() {
    let dir = tempfile::tempdir().unwrap();
    common::write_run(dir.path(), &common::linear_run(101, 0.0));

    // A time window is reinterpreted on the event axis
    let window = AnalysisWindow::new(50.0, 100.0, RangeType::Time).unwrap();
    let verdict = detect_issues_from_records(
        &RunDirectory::new(dir.path()),
        window,
        &IssueThresholds::default(),
    )
    .unwrap();
    assert_eq!(verdict.points, 51);
}

#[test]
fn test_too_few_points() {
    let dir = tempfile::tempdir().unwrap();
    common::write_run(dir.path(), &common::co_run());

    let window = AnalysisWindow::new(100.0, 100.0, RangeType::Events).unwrap();
    let err = detect_issues(dir.path(), window, &IssueThresholds::default()).unwrap_err();
    assert!(matches!(err, KmcError::InsufficientData { .. }));
}

#[test]
fn test_loaded_run_is_reused_without_rereading() {
    let dir = tempfile::tempdir().unwrap();
    common::write_run(dir.path(), &common::linear_run(40, 1e-9));
    let run = LoadedRun::load(&RunDirectory::new(dir.path())).unwrap();
    for entry in fs::read_dir(dir.path()).unwrap() {
        fs::remove_file(entry.unwrap().path()).unwrap();
    }

    let output = KmcOutput::from_loaded(&run, AnalysisWindow::full(RangeType::Time), WeightMode::Time).unwrap();
    assert_eq!(output.nevents().len(), 40);
    let verdict = diagnose_loaded(&run, AnalysisWindow::full(RangeType::Time), &IssueThresholds::default()).unwrap();
    assert!(verdict.energy_trend);
    assert!(verdict.has_issues);
}
