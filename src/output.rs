use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::coverage::{CoverageSummary, SiteTypeCoverage};
use crate::error::KmcResult;
use crate::rates::RateSummary;
use crate::records::{LoadedRun, RunDirectory, RunRecords};
use crate::stats::{average, linear_fit, peak_to_peak, WeightMode, ENERGY_TOLERANCE};
use crate::structure::{LatticeMetadata, RunMetadata, SiteAssignment, SnapshotTable};
use crate::window::{select_window, AnalysisWindow, WindowBounds};

/// Derived, read-only view of one simulation run over an analysis window.
///
/// Everything is computed once on construction; a different window or weight
/// mode needs a new instance.
#[derive(Debug, Clone, Serialize)]
pub struct KmcOutput {
    source: String,
    window: AnalysisWindow,
    weights: WeightMode,
    bounds: WindowBounds,
    metadata: RunMetadata,
    lattice: LatticeMetadata,
    site_assignment: SiteAssignment,
    nevents: Vec<f64>,
    time: Vec<f64>,
    /// eV/Å²
    energy: Vec<f64>,
    /// Unsigned slope of energy vs. events (eV/Å²/step)
    energy_slope: f64,
    av_energy: f64,
    final_energy: f64,
    final_time: f64,
    rates: RateSummary,
    coverage: CoverageSummary,
}

impl KmcOutput {
    /// Reduce the Zacros job in `run_dir`
    pub fn new(run_dir: impl AsRef<Path>, window: AnalysisWindow, weights: WeightMode) -> KmcResult<Self> {
        Self::from_records(&RunDirectory::new(run_dir), window, weights)
    }

    pub fn from_records<R: RunRecords + ?Sized>(
        records: &R,
        window: AnalysisWindow,
        weights: WeightMode,
    ) -> KmcResult<Self> {
        Self::from_loaded(&LoadedRun::load(records)?, window, weights)
    }

    /// Reduce records that were already read, e.g. to derive several windows
    pub fn from_loaded(run: &LoadedRun, window: AnalysisWindow, weights: WeightMode) -> KmcResult<Self> {
        Self::compute(
            run.source.clone(),
            run.metadata.clone(),
            run.lattice.clone(),
            run.site_assignment.clone(),
            &run.table,
            window,
            weights,
        )
    }

    fn compute(
        source: String,
        metadata: RunMetadata,
        lattice: LatticeMetadata,
        site_assignment: SiteAssignment,
        table: &SnapshotTable,
        window: AnalysisWindow,
        weights: WeightMode,
    ) -> KmcResult<Self> {
        let view = select_window(table, &window);
        let nevents = view.nevents().to_vec();
        let time = view.time().to_vec();
        let energy: Vec<f64> = view.energy().iter().map(|e| e / lattice.area).collect();

        let energy_slope = if peak_to_peak(&energy) > ENERGY_TOLERANCE {
            linear_fit(&nevents, &energy)
                .map(|fit| fit.slope.abs())
                .unwrap_or(f64::NAN)
        } else {
            0.0
        };
        let av_energy = average(&energy, weights, &time, &nevents)?;
        let final_energy = energy[energy.len() - 1];
        let final_time = time[time.len() - 1];

        let rates = RateSummary::from_view(&view, lattice.area);
        let coverage = CoverageSummary::compute(&view, &metadata, &lattice, &site_assignment, weights)?;

        debug!(
            source = %source,
            rows = view.len(),
            degenerate = view.is_degenerate(),
            energy_slope = energy_slope,
            "reduced simulation output"
        );

        Ok(Self {
            source,
            window,
            weights,
            bounds: view.bounds(),
            metadata,
            lattice,
            site_assignment,
            nevents,
            time,
            energy,
            energy_slope,
            av_energy,
            final_energy,
            final_time,
            rates,
            coverage,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn window(&self) -> AnalysisWindow {
        self.window
    }

    pub fn weights(&self) -> WeightMode {
        self.weights
    }

    /// Rows of the snapshot table covered by the window
    pub fn bounds(&self) -> WindowBounds {
        self.bounds
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn lattice(&self) -> &LatticeMetadata {
        &self.lattice
    }

    pub fn site_assignment(&self) -> &SiteAssignment {
        &self.site_assignment
    }

    pub fn random_seed(&self) -> Option<u64> {
        self.metadata.random_seed
    }

    pub fn temperature(&self) -> f64 {
        self.metadata.temperature
    }

    pub fn pressure(&self) -> f64 {
        self.metadata.pressure
    }

    pub fn gas_specs_names(&self) -> &[String] {
        &self.metadata.gas_specs_names
    }

    pub fn surf_specs_names(&self) -> &[String] {
        &self.metadata.surf_specs_names
    }

    pub fn n_sites(&self) -> u64 {
        self.lattice.n_sites
    }

    pub fn area(&self) -> f64 {
        self.lattice.area
    }

    pub fn site_types(&self) -> &BTreeMap<String, u64> {
        &self.lattice.site_types
    }

    pub fn nevents(&self) -> &[f64] {
        &self.nevents
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Lattice energy per area (eV/Å²)
    pub fn energy(&self) -> &[f64] {
        &self.energy
    }

    pub fn energy_slope(&self) -> f64 {
        self.energy_slope
    }

    pub fn av_energy(&self) -> f64 {
        self.av_energy
    }

    pub fn final_energy(&self) -> f64 {
        self.final_energy
    }

    /// Simulated time at the end of the window (s)
    pub fn final_time(&self) -> f64 {
        self.final_time
    }

    pub fn rates(&self) -> &RateSummary {
        &self.rates
    }

    /// TOF of a gas species (molecules·s⁻¹·Å⁻²)
    pub fn tof(&self, species: &str) -> KmcResult<f64> {
        self.rates.tof(species)
    }

    pub fn tof_map(&self) -> BTreeMap<String, f64> {
        self.rates.tof_map()
    }

    pub fn production(&self, species: &str) -> KmcResult<&[f64]> {
        self.rates.production(species)
    }

    pub fn total_production(&self, species: &str) -> KmcResult<f64> {
        self.rates.total_production(species)
    }

    pub fn selectivity<S: AsRef<str>>(&self, main_product: &str, side_products: &[S]) -> KmcResult<f64> {
        self.rates.selectivity(main_product, side_products)
    }

    pub fn coverages(&self) -> &CoverageSummary {
        &self.coverage
    }

    /// Coverage series of a surface species over the whole lattice (%)
    pub fn coverage(&self, species: &str) -> KmcResult<&[f64]> {
        self.coverage.coverage(species)
    }

    pub fn average_coverage(&self, species: &str) -> KmcResult<f64> {
        self.coverage.average_coverage(species)
    }

    pub fn av_total_coverage(&self) -> f64 {
        self.coverage.av_total_coverage()
    }

    pub fn dominant_ads(&self) -> Option<&str> {
        self.coverage.dominant_ads()
    }

    pub fn site_type_coverage(&self, site_type: &str) -> KmcResult<&SiteTypeCoverage> {
        self.coverage.site_type(site_type)
    }

    /// Summed average coverage on one site type, at most 100
    pub fn total_coverage(&self, site_type: &str) -> KmcResult<f64> {
        self.coverage.total_coverage(site_type)
    }

    pub fn dominant_species(&self, site_type: &str) -> KmcResult<Option<&str>> {
        self.coverage.dominant_species(site_type)
    }

    pub fn dominant_ads_per_site_type(&self) -> BTreeMap<String, Option<String>> {
        self.coverage
            .site_types()
            .iter()
            .map(|(site_type, c)| (site_type.clone(), c.dominant_ads.clone()))
            .collect()
    }

    pub fn av_coverage_per_site_type(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.coverage
            .site_types()
            .iter()
            .map(|(site_type, c)| (site_type.clone(), c.av_coverage.clone()))
            .collect()
    }
}
