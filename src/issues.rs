use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::{KmcError, KmcResult};
use crate::output::KmcOutput;
use crate::records::{LoadedRun, RunDirectory, RunRecords};
use crate::stats::{downsample_indices, linear_fit, pearson_r_squared, take_indices, WeightMode};
use crate::window::{AnalysisWindow, RangeType};

/// Limits beyond which a run is considered not to have reached steady state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IssueThresholds {
    /// Largest acceptable |d energy / d events| (eV/Å²/step)
    pub energy_slope_threshold: f64,
    /// Smallest acceptable R² of time vs. events
    pub r2_threshold: f64,
    /// Samples kept for the regressions
    pub max_points: usize,
}

impl Default for IssueThresholds {
    fn default() -> Self {
        Self {
            energy_slope_threshold: 5.0e-10,
            r2_threshold: 0.95,
            max_points: 100,
        }
    }
}

/// Outcome of the steady-state checks for one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IssueVerdict {
    pub has_issues: bool,
    /// Energy keeps drifting with the event count
    pub energy_trend: bool,
    /// Time does not advance linearly with the event count
    pub time_not_linear: bool,
    /// |slope| of energy vs. events (eV/Å²/step)
    pub energy_slope: f64,
    /// R² between recorded and fitted time
    pub time_r_squared: f64,
    /// Samples the regressions used
    pub points: usize,
}

/// Run both regressions on the event, time and energy series of a reduced run
pub fn diagnose(output: &KmcOutput, thresholds: &IssueThresholds) -> KmcResult<IssueVerdict> {
    let indices = downsample_indices(output.nevents().len(), thresholds.max_points);
    if indices.len() < 2 {
        return Err(KmcError::InsufficientData {
            what: format!(
                "{}: {} point(s) left for the steady-state regressions, need at least 2",
                output.source(),
                indices.len()
            ),
        });
    }
    let nevents = take_indices(output.nevents(), &indices);
    let time = take_indices(output.time(), &indices);
    let energy = take_indices(output.energy(), &indices);

    let degenerate = || KmcError::InsufficientData {
        what: format!("{}: event count does not advance in the window", output.source()),
    };
    let energy_fit = linear_fit(&nevents, &energy).ok_or_else(degenerate)?;
    let time_fit = linear_fit(&nevents, &time).ok_or_else(degenerate)?;

    let predicted: Vec<f64> = nevents.iter().map(|&n| time_fit.predict(n)).collect();
    let time_r_squared = pearson_r_squared(&time, &predicted);

    let energy_slope = energy_fit.slope.abs();
    let energy_trend = energy_slope > thresholds.energy_slope_threshold;
    // A time axis that does not advance gives a NaN R², which is not flagged
    let time_not_linear = time_r_squared < thresholds.r2_threshold;

    debug!(
        source = output.source(),
        points = indices.len(),
        energy_slope = energy_slope,
        time_r_squared = time_r_squared,
        "steady-state diagnostics"
    );

    Ok(IssueVerdict {
        has_issues: energy_trend || time_not_linear,
        energy_trend,
        time_not_linear,
        energy_slope,
        time_r_squared,
        points: indices.len(),
    })
}

/// Reduce `records` over the event-based version of `window` and diagnose it
pub fn detect_issues_from_records<R: RunRecords + ?Sized>(
    records: &R,
    window: AnalysisWindow,
    thresholds: &IssueThresholds,
) -> KmcResult<IssueVerdict> {
    diagnose_loaded(&LoadedRun::load(records)?, window, thresholds)
}

/// Diagnose records that were already read over the event-based version of `window`
pub fn diagnose_loaded(
    run: &LoadedRun,
    window: AnalysisWindow,
    thresholds: &IssueThresholds,
) -> KmcResult<IssueVerdict> {
    let output = KmcOutput::from_loaded(
        run,
        window.with_range_type(RangeType::Events),
        WeightMode::Events,
    )?;
    diagnose(&output, thresholds)
}

/// Whether the run in `run_dir` shows signs of not being at steady state
pub fn detect_issues(
    run_dir: impl AsRef<Path>,
    window: AnalysisWindow,
    thresholds: &IssueThresholds,
) -> KmcResult<bool> {
    let verdict =
        detect_issues_from_records(&RunDirectory::new(run_dir), window, thresholds)?;
    Ok(verdict.has_issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{
        LatticeMetadata, ReportingScheme, RunMetadata, SiteAssignment, SnapshotTable,
        SpeciesColumn,
    };
    use std::collections::BTreeMap;

    struct Synthetic {
        nevents: Vec<f64>,
        time: Vec<f64>,
        energy: Vec<f64>,
    }

    impl RunRecords for Synthetic {
        fn run_metadata(&self) -> KmcResult<RunMetadata> {
            Ok(RunMetadata {
                random_seed: None,
                temperature: 600.0,
                pressure: 2.0,
                gas_specs_names: vec!["CO2".into()],
                gas_energies: vec![],
                gas_molec_weights: vec![],
                gas_molar_fracs: vec![],
                surf_specs_names: vec!["O".into()],
                surf_specs_dent: vec![1],
                reporting: ReportingScheme::default(),
            })
        }

        fn lattice_metadata(&self) -> KmcResult<LatticeMetadata> {
            Ok(LatticeMetadata {
                n_sites: 100,
                area: 1.0,
                site_types: BTreeMap::from([("StTp1".to_string(), 100)]),
                version: None,
                final_time: None,
                final_nevents: None,
            })
        }

        fn snapshot_table(&self) -> KmcResult<SnapshotTable> {
            let n = self.nevents.len();
            SnapshotTable::new(
                self.nevents.clone(),
                self.time.clone(),
                self.energy.clone(),
                vec![SpeciesColumn::new("O", vec![10.0; n])],
                vec![SpeciesColumn::new("CO2", self.nevents.clone())],
            )
        }

        fn site_assignment(&self, metadata: &RunMetadata) -> KmcResult<SiteAssignment> {
            Ok(SiteAssignment::uniform(&metadata.surf_specs_names, "StTp1"))
        }

        fn describe(&self) -> String {
            "synthetic".to_string()
        }
    }

    fn linear_run(n: usize, energy_rate: f64) -> Synthetic {
        let nevents: Vec<f64> = (0..n).map(|i| i as f64 * 1000.0).collect();
        Synthetic {
            time: nevents.iter().map(|e| e * 1e-3).collect(),
            energy: nevents.iter().map(|e| -5.0 + e * energy_rate).collect(),
            nevents,
        }
    }

    #[test]
    fn test_steady_run_has_no_issues() {
        let v = detect_issues_from_records(
            &linear_run(500, 0.0),
            AnalysisWindow::full(RangeType::Time),
            &IssueThresholds::default(),
        )
        .unwrap();
        assert!(!v.has_issues);
        assert_eq!(v.points, 100);
        assert!((v.time_r_squared - 1.0).abs() < 1e-12);
        assert!(v.energy_slope < 1e-15);
    }

    #[test]
    fn test_drifting_energy_is_flagged() {
        let v = detect_issues_from_records(
            &linear_run(50, 1e-9),
            AnalysisWindow::full(RangeType::Events),
            &IssueThresholds::default(),
        )
        .unwrap();
        assert!(v.energy_trend);
        assert!(!v.time_not_linear);
        assert!(v.has_issues);
    }

    #[test]
    fn test_nonlinear_time_is_flagged() {
        let mut run = linear_run(50, 0.0);
        // Nearly all simulated time is spent in the final event
        run.time = run.nevents.iter().map(|e| (e / 1000.0).powi(12)).collect();
        let v = detect_issues_from_records(
            &run,
            AnalysisWindow::full(RangeType::Events),
            &IssueThresholds::default(),
        )
        .unwrap();
        assert!(v.time_not_linear);
        assert!(v.has_issues);
    }

    #[test]
    fn test_flat_time_and_energy_are_not_flagged() {
        let nevents: Vec<f64> = (0..10).map(|i| i as f64 * 100.0).collect();
        let run = Synthetic {
            time: vec![5.0; nevents.len()],
            energy: vec![-1.0; nevents.len()],
            nevents,
        };
        let v = detect_issues_from_records(
            &run,
            AnalysisWindow::full(RangeType::Events),
            &IssueThresholds::default(),
        )
        .unwrap();
        assert!(v.time_r_squared.is_nan());
        assert_eq!(v.energy_slope, 0.0);
        assert!(!v.time_not_linear);
        assert!(!v.has_issues);
    }

    #[test]
    fn test_single_point_is_insufficient() {
        let window = AnalysisWindow::new(100.0, 100.0, RangeType::Events).unwrap();
        let err = detect_issues_from_records(&linear_run(10, 0.0), window, &IssueThresholds::default())
            .unwrap_err();
        assert!(matches!(err, KmcError::InsufficientData { .. }));
    }
}
