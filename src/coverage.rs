use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::error::{KmcError, KmcResult};
use crate::stats::{average, WeightMode};
use crate::structure::{LatticeMetadata, RunMetadata, SiteAssignment};
use crate::window::SnapshotView;

/// Summed average coverages above `100 + this` are reported before clamping
const OVERSHOOT_WARN_MARGIN: f64 = 1e-6;

/// Coverage (%) of `counts` adsorbates occupying `dentation` sites each out of `sites`
pub fn percent_coverage(counts: &[f64], dentation: u32, sites: u64) -> Vec<f64> {
    let factor = f64::from(dentation) / sites as f64 * 100.0;
    counts.iter().map(|c| c * factor).collect()
}

fn clamp_total(total: f64, scope: &str) -> f64 {
    if total > 100.0 + OVERSHOOT_WARN_MARGIN {
        warn!(
            scope = scope,
            total = total,
            "summed average coverage exceeds 100%, clamping"
        );
    }
    total.min(100.0)
}

fn sum_series(len: usize, series: &BTreeMap<String, Vec<f64>>) -> Vec<f64> {
    let mut total = vec![0.0; len];
    for values in series.values() {
        for (acc, v) in total.iter_mut().zip(values) {
            *acc += v;
        }
    }
    total
}

/// Highest average coverage; ties go to the species listed first in `order`
fn dominant(order: &[String], averages: &BTreeMap<String, f64>) -> Option<String> {
    let mut best: Option<(&str, f64)> = None;
    for name in order {
        if let Some(&value) = averages.get(name) {
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((name.as_str(), value)),
            }
        }
    }
    best.map(|(name, _)| name.to_string())
}

/// Coverages restricted to the sites of one type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteTypeCoverage {
    /// Species on this site type, in header order
    pub species: Vec<String>,
    pub coverage: BTreeMap<String, Vec<f64>>,
    pub av_coverage: BTreeMap<String, f64>,
    pub total_coverage: Vec<f64>,
    /// Sum of the average coverages, at most 100
    pub av_total_coverage: f64,
    pub dominant_ads: Option<String>,
}

/// Coverages of every surface species, over the whole lattice and per site type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageSummary {
    species: Vec<String>,
    coverage: BTreeMap<String, Vec<f64>>,
    av_coverage: BTreeMap<String, f64>,
    total_coverage: Vec<f64>,
    av_total_coverage: f64,
    dominant_ads: Option<String>,
    per_site_type: BTreeMap<String, SiteTypeCoverage>,
}

impl CoverageSummary {
    pub fn compute(
        view: &SnapshotView<'_>,
        metadata: &RunMetadata,
        lattice: &LatticeMetadata,
        assignment: &SiteAssignment,
        weights: WeightMode,
    ) -> KmcResult<Self> {
        assignment.validate(metadata, lattice)?;

        let time = view.time();
        let nevents = view.nevents();

        let mut per_site_type: BTreeMap<String, SiteTypeCoverage> = lattice
            .site_types
            .keys()
            .map(|st| (st.clone(), SiteTypeCoverage::default()))
            .collect();

        let mut species = Vec::new();
        let mut coverage = BTreeMap::new();
        let mut av_coverage = BTreeMap::new();

        for (name, counts) in view.surface() {
            let dentation = metadata.dentation(name)?;
            let site_type = assignment.site_type_of(name)?;

            let lattice_cov = percent_coverage(counts, dentation, lattice.n_sites);
            let lattice_avg = average(&lattice_cov, weights, time, nevents)?;
            species.push(name.to_string());
            coverage.insert(name.to_string(), lattice_cov);
            av_coverage.insert(name.to_string(), lattice_avg);

            let sites = lattice.sites_of_type(site_type)?;
            let site_cov = percent_coverage(counts, dentation, sites);
            let site_avg = average(&site_cov, weights, time, nevents)?;
            let entry = per_site_type
                .get_mut(site_type)
                .ok_or_else(|| KmcError::unknown_site_type(site_type))?;
            entry.species.push(name.to_string());
            entry.coverage.insert(name.to_string(), site_cov);
            entry.av_coverage.insert(name.to_string(), site_avg);
        }

        for (site_type, entry) in per_site_type.iter_mut() {
            entry.total_coverage = sum_series(view.len(), &entry.coverage);
            entry.av_total_coverage = clamp_total(entry.av_coverage.values().sum(), site_type);
            entry.dominant_ads = dominant(&entry.species, &entry.av_coverage);
        }

        Ok(Self {
            total_coverage: sum_series(view.len(), &coverage),
            av_total_coverage: clamp_total(av_coverage.values().sum(), "lattice"),
            dominant_ads: dominant(&species, &av_coverage),
            species,
            coverage,
            av_coverage,
            per_site_type,
        })
    }

    /// Surface species in header order
    pub fn species(&self) -> &[String] {
        &self.species
    }

    /// Coverage series (%) over the whole lattice
    pub fn coverage(&self, species: &str) -> KmcResult<&[f64]> {
        self.coverage
            .get(species)
            .map(Vec::as_slice)
            .ok_or_else(|| KmcError::unknown_species(species))
    }

    pub fn average_coverage(&self, species: &str) -> KmcResult<f64> {
        self.av_coverage
            .get(species)
            .copied()
            .ok_or_else(|| KmcError::unknown_species(species))
    }

    pub fn av_coverage(&self) -> &BTreeMap<String, f64> {
        &self.av_coverage
    }

    pub fn total_coverage_series(&self) -> &[f64] {
        &self.total_coverage
    }

    pub fn av_total_coverage(&self) -> f64 {
        self.av_total_coverage
    }

    pub fn dominant_ads(&self) -> Option<&str> {
        self.dominant_ads.as_deref()
    }

    pub fn site_type(&self, site_type: &str) -> KmcResult<&SiteTypeCoverage> {
        self.per_site_type
            .get(site_type)
            .ok_or_else(|| KmcError::unknown_site_type(site_type))
    }

    pub fn site_types(&self) -> &BTreeMap<String, SiteTypeCoverage> {
        &self.per_site_type
    }

    /// Sum of average coverages on `site_type`, clamped to 100
    pub fn total_coverage(&self, site_type: &str) -> KmcResult<f64> {
        Ok(self.site_type(site_type)?.av_total_coverage)
    }

    /// Species with the highest average coverage on `site_type`, if any adsorb there
    pub fn dominant_species(&self, site_type: &str) -> KmcResult<Option<&str>> {
        Ok(self.site_type(site_type)?.dominant_ads.as_deref())
    }

    /// Average coverage of `species` relative to the sites of its own type
    pub fn average_coverage_on(&self, site_type: &str, species: &str) -> KmcResult<f64> {
        self.site_type(site_type)?
            .av_coverage
            .get(species)
            .copied()
            .ok_or_else(|| KmcError::unknown_species(species))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{ReportingScheme, SnapshotTable, SpeciesColumn};
    use crate::window::{select_window, AnalysisWindow, RangeType};

    fn metadata() -> RunMetadata {
        RunMetadata {
            random_seed: None,
            temperature: 600.0,
            pressure: 1.0,
            gas_specs_names: vec![],
            gas_energies: vec![],
            gas_molec_weights: vec![],
            gas_molar_fracs: vec![],
            surf_specs_names: vec!["CO".into(), "O".into(), "O2".into()],
            surf_specs_dent: vec![1, 1, 2],
            reporting: ReportingScheme::default(),
        }
    }

    fn lattice() -> LatticeMetadata {
        LatticeMetadata {
            n_sites: 20,
            area: 20.0,
            site_types: BTreeMap::from([
                ("top".to_string(), 10),
                ("hollow".to_string(), 8),
                ("bridge".to_string(), 2),
            ]),
            version: None,
            final_time: None,
            final_nevents: None,
        }
    }

    fn assignment() -> SiteAssignment {
        let mut a = SiteAssignment::new();
        a.assign("CO", "top").unwrap();
        a.assign("O", "hollow").unwrap();
        a.assign("O2", "hollow").unwrap();
        a
    }

    fn table() -> SnapshotTable {
        SnapshotTable::new(
            vec![0.0, 10.0, 20.0],
            vec![0.0, 1.0, 2.0],
            vec![0.0; 3],
            vec![
                SpeciesColumn::new("CO", vec![0.0, 5.0, 5.0]),
                SpeciesColumn::new("O", vec![0.0, 2.0, 2.0]),
                SpeciesColumn::new("O2", vec![0.0, 1.0, 1.0]),
            ],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_lattice_and_site_type_coverage() {
        let t = table();
        let view = select_window(&t, &AnalysisWindow::full(RangeType::Time));
        let cov =
            CoverageSummary::compute(&view, &metadata(), &lattice(), &assignment(), WeightMode::Time)
                .unwrap();

        assert_eq!(cov.coverage("CO").unwrap(), &[0.0, 25.0, 25.0]);
        assert_eq!(cov.average_coverage("CO").unwrap(), 25.0);
        // bidentate: 1 adsorbate covers 2 of the 20 sites
        assert_eq!(cov.average_coverage("O2").unwrap(), 10.0);

        assert_eq!(cov.average_coverage_on("top", "CO").unwrap(), 50.0);
        assert_eq!(cov.average_coverage_on("hollow", "O").unwrap(), 25.0);
        assert_eq!(cov.average_coverage_on("hollow", "O2").unwrap(), 25.0);
        assert_eq!(cov.total_coverage("hollow").unwrap(), 50.0);
        assert_eq!(cov.site_type("hollow").unwrap().total_coverage, vec![0.0, 50.0, 50.0]);
    }

    #[test]
    fn test_dominant_species() {
        let t = table();
        let view = select_window(&t, &AnalysisWindow::full(RangeType::Time));
        let cov =
            CoverageSummary::compute(&view, &metadata(), &lattice(), &assignment(), WeightMode::None)
                .unwrap();
        assert_eq!(cov.dominant_ads(), Some("CO"));
        assert_eq!(cov.dominant_species("top").unwrap(), Some("CO"));
        // O and O2 tie on hollow, the first declared wins
        assert_eq!(cov.dominant_species("hollow").unwrap(), Some("O"));
        assert_eq!(cov.dominant_species("bridge").unwrap(), None);
        assert_eq!(cov.total_coverage("bridge").unwrap(), 0.0);
        assert!(matches!(
            cov.dominant_species("fcc"),
            Err(KmcError::UnknownSiteType { .. })
        ));
    }

    #[test]
    fn test_total_is_clamped_to_100() {
        let t = SnapshotTable::new(
            vec![0.0],
            vec![0.0],
            vec![0.0],
            vec![
                SpeciesColumn::new("CO", vec![10.0]),
                SpeciesColumn::new("O", vec![0.0]),
                SpeciesColumn::new("O2", vec![4.000001]),
            ],
            vec![],
        )
        .unwrap();
        let mut a = SiteAssignment::new();
        a.assign("CO", "top").unwrap();
        a.assign("O", "top").unwrap();
        a.assign("O2", "hollow").unwrap();
        let view = select_window(&t, &AnalysisWindow::full(RangeType::Time));
        let cov = CoverageSummary::compute(&view, &metadata(), &lattice(), &a, WeightMode::None)
            .unwrap();
        assert!(cov.average_coverage_on("hollow", "O2").unwrap() > 100.0);
        assert_eq!(cov.total_coverage("hollow").unwrap(), 100.0);
        assert!(cov.av_total_coverage() <= 100.0);
    }

    #[test]
    fn test_missing_assignment_is_inconsistent() {
        let t = table();
        let view = select_window(&t, &AnalysisWindow::full(RangeType::Time));
        let partial = SiteAssignment::uniform(&["CO", "O"], "top");
        assert!(matches!(
            CoverageSummary::compute(&view, &metadata(), &lattice(), &partial, WeightMode::None),
            Err(KmcError::InconsistentModel { .. })
        ));
    }
}
