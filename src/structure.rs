use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{KmcError, KmcResult};

/// Run configuration, parsed once from the run-configuration record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub random_seed: Option<u64>,
    /// Temperature (K)
    pub temperature: f64,
    /// Total pressure (bar)
    pub pressure: f64,
    pub gas_specs_names: Vec<String>,
    pub gas_energies: Vec<f64>,
    pub gas_molec_weights: Vec<f64>,
    pub gas_molar_fracs: Vec<f64>,
    /// Surface species names without the trailing `*` markers
    pub surf_specs_names: Vec<String>,
    /// Number of lattice sites each surface species occupies
    pub surf_specs_dent: Vec<u32>,
    pub reporting: ReportingScheme,
}

/// Reporting and stopping keywords, kept verbatim
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportingScheme {
    pub snapshots: Option<String>,
    pub process_statistics: Option<String>,
    pub species_numbers: Option<String>,
    pub max_steps: Option<String>,
    pub max_time: Option<String>,
    pub wall_time: Option<String>,
}

impl RunMetadata {
    pub fn n_gas_species(&self) -> usize {
        self.gas_specs_names.len()
    }

    pub fn n_surf_species(&self) -> usize {
        self.surf_specs_names.len()
    }

    /// Number of sites occupied by one adsorbate of `name`
    pub fn dentation(&self, name: &str) -> KmcResult<u32> {
        self.surf_specs_names
            .iter()
            .position(|s| s == name)
            .map(|idx| self.surf_specs_dent[idx])
            .ok_or_else(|| KmcError::unknown_species(name))
    }
}

/// Lattice information from the general-output record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatticeMetadata {
    pub n_sites: u64,
    /// Lattice surface area (Å²)
    pub area: f64,
    /// Site type name -> number of sites of that type
    pub site_types: BTreeMap<String, u64>,
    pub version: Option<String>,
    /// KMC time reported when the simulation stopped
    pub final_time: Option<f64>,
    /// Events reported when the simulation stopped
    pub final_nevents: Option<u64>,
}

impl LatticeMetadata {
    pub fn sites_of_type(&self, site_type: &str) -> KmcResult<u64> {
        self.site_types
            .get(site_type)
            .copied()
            .ok_or_else(|| KmcError::unknown_site_type(site_type))
    }
}

/// One named column of cumulative counts
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesColumn {
    pub name: String,
    pub values: Vec<f64>,
}

impl SpeciesColumn {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Snapshot rows of one run, stored column-wise.
///
/// Counts are integral but kept as `f64`, which is exact well beyond any
/// realistic event or molecule count and avoids conversions in the fits.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotTable {
    nevents: Vec<f64>,
    time: Vec<f64>,
    energy: Vec<f64>,
    surface: Vec<SpeciesColumn>,
    gas: Vec<SpeciesColumn>,
}

impl SnapshotTable {
    pub fn new(
        nevents: Vec<f64>,
        time: Vec<f64>,
        energy: Vec<f64>,
        surface: Vec<SpeciesColumn>,
        gas: Vec<SpeciesColumn>,
    ) -> KmcResult<Self> {
        let source = Path::new("<snapshot table>");
        let rows = nevents.len();
        if rows == 0 {
            return Err(KmcError::malformed(source, "table has no rows"));
        }
        if time.len() != rows || energy.len() != rows {
            return Err(KmcError::malformed(
                source,
                format!(
                    "column lengths differ (nevents={}, time={}, energy={})",
                    rows,
                    time.len(),
                    energy.len()
                ),
            ));
        }
        for column in surface.iter().chain(gas.iter()) {
            if column.values.len() != rows {
                return Err(KmcError::malformed(
                    source,
                    format!(
                        "column '{}' has {} rows, expected {}",
                        column.name,
                        column.values.len(),
                        rows
                    ),
                ));
            }
        }
        Ok(Self {
            nevents,
            time,
            energy,
            surface,
            gas,
        })
    }

    pub fn len(&self) -> usize {
        self.nevents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nevents.is_empty()
    }

    pub fn nevents(&self) -> &[f64] {
        &self.nevents
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn energy(&self) -> &[f64] {
        &self.energy
    }

    pub fn surface(&self) -> &[SpeciesColumn] {
        &self.surface
    }

    pub fn gas(&self) -> &[SpeciesColumn] {
        &self.gas
    }
}

/// Site type each surface species adsorbs on
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteAssignment {
    site_of: BTreeMap<String, String>,
}

impl SiteAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every species on the same site type (default lattices have a single one)
    pub fn uniform<S: AsRef<str>>(species: &[S], site_type: &str) -> Self {
        let site_of = species
            .iter()
            .map(|s| (s.as_ref().to_string(), site_type.to_string()))
            .collect();
        Self { site_of }
    }

    /// Record `species` on `site_type`; a second, different site type is an error
    pub fn assign(&mut self, species: &str, site_type: &str) -> KmcResult<()> {
        match self.site_of.get(species) {
            Some(existing) if existing != site_type => Err(KmcError::InconsistentModel {
                what: format!(
                    "species '{}' is adsorbed on multiple site types: '{}' and '{}'",
                    species, existing, site_type
                ),
            }),
            Some(_) => Ok(()),
            None => {
                self.site_of
                    .insert(species.to_string(), site_type.to_string());
                Ok(())
            }
        }
    }

    pub fn site_type_of(&self, species: &str) -> KmcResult<&str> {
        self.site_of
            .get(species)
            .map(String::as_str)
            .ok_or_else(|| KmcError::unknown_species(species))
    }

    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.site_of.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.site_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.site_of.is_empty()
    }

    /// Check the assignment covers exactly the declared surface species and
    /// only names site types the lattice has.
    pub fn validate(&self, metadata: &RunMetadata, lattice: &LatticeMetadata) -> KmcResult<()> {
        for species in &metadata.surf_specs_names {
            if !self.site_of.contains_key(species) {
                return Err(KmcError::InconsistentModel {
                    what: format!(
                        "species '{}' declared in surf_specs_names but has no site type assignment",
                        species
                    ),
                });
            }
        }
        for (species, site_type) in &self.site_of {
            if !metadata.surf_specs_names.contains(species) {
                return Err(KmcError::InconsistentModel {
                    what: format!(
                        "species '{}' has a site type assignment but is not in surf_specs_names",
                        species
                    ),
                });
            }
            if !lattice.site_types.contains_key(site_type) {
                return Err(KmcError::InconsistentModel {
                    what: format!(
                        "species '{}' is assigned to site type '{}', which the lattice does not have",
                        species, site_type
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> RunMetadata {
        RunMetadata {
            random_seed: Some(1),
            temperature: 500.0,
            pressure: 2.0,
            gas_specs_names: vec!["CO".into(), "O2".into()],
            gas_energies: vec![0.0, 0.0],
            gas_molec_weights: vec![28.0, 32.0],
            gas_molar_fracs: vec![0.25, 0.75],
            surf_specs_names: vec!["CO".into(), "O".into()],
            surf_specs_dent: vec![1, 1],
            reporting: ReportingScheme::default(),
        }
    }

    fn lattice() -> LatticeMetadata {
        LatticeMetadata {
            n_sites: 10,
            area: 10.0,
            site_types: BTreeMap::from([("top".to_string(), 10)]),
            version: None,
            final_time: None,
            final_nevents: None,
        }
    }

    #[test]
    fn test_table_rejects_ragged_columns() {
        let err = SnapshotTable::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, KmcError::MalformedRecord { .. }));
    }

    #[test]
    fn test_assignment_conflict() {
        let mut a = SiteAssignment::new();
        a.assign("CO", "top").unwrap();
        a.assign("CO", "top").unwrap();
        assert!(matches!(
            a.assign("CO", "hollow"),
            Err(KmcError::InconsistentModel { .. })
        ));
    }

    #[test]
    fn test_assignment_must_match_declared_species() {
        let m = metadata();
        let l = lattice();

        let missing = SiteAssignment::uniform(&["CO"], "top");
        assert!(matches!(
            missing.validate(&m, &l),
            Err(KmcError::InconsistentModel { .. })
        ));

        let extra = SiteAssignment::uniform(&["CO", "O", "H"], "top");
        assert!(matches!(
            extra.validate(&m, &l),
            Err(KmcError::InconsistentModel { .. })
        ));

        let wrong_site = SiteAssignment::uniform(&["CO", "O"], "bridge");
        assert!(wrong_site.validate(&m, &l).is_err());

        SiteAssignment::uniform(&["CO", "O"], "top")
            .validate(&m, &l)
            .unwrap();
    }
}
