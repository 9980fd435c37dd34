use std::collections::BTreeMap;

use kmc_analysis_rs::rates::{production_rate, selectivity};
use kmc_analysis_rs::window::resolve_bounds;
use kmc_analysis_rs::{
    average, select_window, AnalysisWindow, CoverageSummary, LatticeMetadata, RangeType,
    RunMetadata, SiteAssignment, SnapshotTable, SpeciesColumn, WeightMode,
};
use kmc_analysis_rs::structure::ReportingScheme;
use proptest::prelude::*;

/// Non-decreasing axis starting at 0, built from non-negative increments
fn axis_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0u32..50, 1..40).prop_map(|steps| {
        let mut acc = 0.0;
        let mut axis = vec![0.0];
        for s in steps {
            acc += f64::from(s) * 0.25;
            axis.push(acc);
        }
        axis
    })
}

fn two_species_run(a: f64, b: f64, sites: u64) -> (RunMetadata, LatticeMetadata, SnapshotTable) {
    let metadata = RunMetadata {
        random_seed: None,
        temperature: 500.0,
        pressure: 1.0,
        gas_specs_names: vec![],
        gas_energies: vec![],
        gas_molec_weights: vec![],
        gas_molar_fracs: vec![],
        surf_specs_names: vec!["A".into(), "B".into()],
        surf_specs_dent: vec![1, 1],
        reporting: ReportingScheme::default(),
    };
    let lattice = LatticeMetadata {
        n_sites: sites,
        area: 1.0,
        site_types: BTreeMap::from([("StTp1".to_string(), sites)]),
        version: None,
        final_time: None,
        final_nevents: None,
    };
    let table = SnapshotTable::new(
        vec![0.0, 10.0, 20.0],
        vec![0.0, 1.0, 3.0],
        vec![0.0; 3],
        vec![
            SpeciesColumn::new("A", vec![a; 3]),
            SpeciesColumn::new("B", vec![b; 3]),
        ],
        vec![],
    )
    .unwrap();
    (metadata, lattice, table)
}

proptest! {
    #[test]
    fn window_resolution_is_monotonic(
        axis in axis_strategy(),
        start in 0.0f64..=100.0,
        a in 0.0f64..=100.0,
        b in 0.0f64..=100.0,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let start = start.min(lo);
        let narrow = resolve_bounds(&axis, start, lo);
        let wide = resolve_bounds(&axis, start, hi);
        prop_assert!(narrow.start_idx <= narrow.end_idx);
        prop_assert!(wide.start_idx <= wide.end_idx);
        prop_assert!(narrow.end_idx <= wide.end_idx);
        prop_assert!(wide.end_idx < axis.len());
    }

    #[test]
    fn full_window_keeps_every_row(axis in axis_strategy()) {
        let bounds = resolve_bounds(&axis, 0.0, 100.0);
        prop_assert_eq!(bounds.start_idx, 0);
        prop_assert_eq!(bounds.end_idx, axis.len() - 1);
    }

    #[test]
    fn single_sample_average_passes_through(value in -1.0e6f64..1.0e6, t in 0.0f64..1.0e3) {
        for mode in [WeightMode::None, WeightMode::Time, WeightMode::Events] {
            prop_assert_eq!(average(&[value], mode, &[t], &[t]).unwrap(), value);
        }
    }

    #[test]
    fn flat_production_has_zero_tof(count in -1.0e6f64..1.0e6, n in 1usize..20) {
        let time: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
        prop_assert_eq!(production_rate(&time, &vec![count; n]), 0.0);
    }

    #[test]
    fn selectivity_is_a_percentage(main in 0.0f64..1.0e3, sides in 0.0f64..1.0e3) {
        let s = selectivity(main, sides);
        if main + sides == 0.0 {
            prop_assert!(s.is_nan());
        } else {
            prop_assert!((0.0..=100.0).contains(&s));
        }
    }

    #[test]
    fn total_coverage_never_exceeds_100(sites in 1u64..200, fa in 0.0f64..=1.0, fb in 0.0f64..=1.0) {
        let a = (fa * sites as f64).round();
        let b = (fb * sites as f64).round();
        let (metadata, lattice, table) = two_species_run(a, b, sites);
        let view = select_window(&table, &AnalysisWindow::full(RangeType::Time));
        let assignment = SiteAssignment::uniform(&metadata.surf_specs_names, "StTp1");
        let coverage = CoverageSummary::compute(&view, &metadata, &lattice, &assignment, WeightMode::Time).unwrap();
        prop_assert!(coverage.total_coverage("StTp1").unwrap() <= 100.0);
        prop_assert!(coverage.av_total_coverage() <= 100.0);
    }
}
