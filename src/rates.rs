use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{KmcError, KmcResult};
use crate::stats::{linear_fit, peak_to_peak, PRODUCTION_TOLERANCE};
use crate::window::SnapshotView;

/// Production of one gas species over the analysis window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasProduction {
    /// Cumulative molecules produced (negative when consumed)
    pub production: Vec<f64>,
    /// Last minus first cumulative count in the window
    pub total_production: f64,
    /// Turnover frequency (molecules·s⁻¹·Å⁻²)
    pub tof: f64,
}

/// Slope of cumulative count vs. time (molecules/s).
///
/// Flat series and fitted slopes within [`PRODUCTION_TOLERANCE`] of zero are
/// reported as exactly `0.0`.
pub fn production_rate(time: &[f64], counts: &[f64]) -> f64 {
    if counts.len() < 2 || peak_to_peak(counts) <= PRODUCTION_TOLERANCE {
        return 0.0;
    }
    match linear_fit(time, counts) {
        Some(fit) if fit.slope.abs() > PRODUCTION_TOLERANCE => fit.slope,
        _ => 0.0,
    }
}

pub fn total_production(counts: &[f64]) -> f64 {
    match (counts.first(), counts.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    }
}

/// `main / (main + sides) * 100`, NaN when the denominator is exactly zero
pub fn selectivity(tof_main: f64, tof_sides: f64) -> f64 {
    let total = tof_main + tof_sides;
    if total == 0.0 {
        f64::NAN
    } else {
        tof_main / total * 100.0
    }
}

/// Production and TOF for every gas species of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSummary {
    species: Vec<String>,
    by_species: BTreeMap<String, GasProduction>,
}

impl RateSummary {
    pub fn from_view(view: &SnapshotView<'_>, area: f64) -> Self {
        let time = view.time();
        let mut species = Vec::new();
        let mut by_species = BTreeMap::new();
        for (name, counts) in view.gas() {
            let rate = production_rate(time, counts);
            species.push(name.to_string());
            by_species.insert(
                name.to_string(),
                GasProduction {
                    production: counts.to_vec(),
                    total_production: total_production(counts),
                    tof: rate / area,
                },
            );
        }
        Self {
            species,
            by_species,
        }
    }

    /// Gas species in header order
    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn get(&self, name: &str) -> KmcResult<&GasProduction> {
        self.by_species
            .get(name)
            .ok_or_else(|| KmcError::unknown_species(name))
    }

    pub fn tof(&self, name: &str) -> KmcResult<f64> {
        Ok(self.get(name)?.tof)
    }

    pub fn total_production(&self, name: &str) -> KmcResult<f64> {
        Ok(self.get(name)?.total_production)
    }

    pub fn production(&self, name: &str) -> KmcResult<&[f64]> {
        Ok(&self.get(name)?.production)
    }

    pub fn tof_map(&self) -> BTreeMap<String, f64> {
        self.by_species
            .iter()
            .map(|(name, p)| (name.clone(), p.tof))
            .collect()
    }

    /// Selectivity (%) of `main` against `side_products`
    pub fn selectivity<S: AsRef<str>>(&self, main: &str, side_products: &[S]) -> KmcResult<f64> {
        let tof_main = self.tof(main)?;
        let mut tof_sides = 0.0;
        for side in side_products {
            tof_sides += self.tof(side.as_ref())?;
        }
        Ok(selectivity(tof_main, tof_sides))
    }
}
