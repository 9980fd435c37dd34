use std::path::{Path, PathBuf};

use crate::energetics::load_site_assignment;
use crate::error::{KmcError, KmcResult};
use crate::general_output::{parse_general_output, GENERAL_OUTPUT_FILE};
use crate::simulation_input::{parse_simulation_input, SIMULATION_INPUT_FILE};
use crate::specnum::{parse_specnum_output, SPECNUM_OUTPUT_FILE};
use crate::structure::{LatticeMetadata, RunMetadata, SiteAssignment, SnapshotTable};

/// Source of the records describing one simulation run
pub trait RunRecords {
    /// Run configuration (seed, temperature, pressure, species)
    fn run_metadata(&self) -> KmcResult<RunMetadata>;

    /// Lattice size, area and site types
    fn lattice_metadata(&self) -> KmcResult<LatticeMetadata>;

    /// Recorded snapshots of event count, time, energy and species counts
    fn snapshot_table(&self) -> KmcResult<SnapshotTable>;

    /// Site type of every surface species in `metadata`
    fn site_assignment(&self, metadata: &RunMetadata) -> KmcResult<SiteAssignment>;

    /// Human-readable origin, used in log messages
    fn describe(&self) -> String;
}

/// Header species must match the configuration one-to-one
fn check_species(record: &Path, kind: &str, header: &[&str], declared: &[String]) -> KmcResult<()> {
    let missing = declared.iter().any(|d| !header.contains(&d.as_str()));
    let extra = header.iter().any(|h| !declared.iter().any(|d| d == h));
    if missing || extra || header.len() != declared.len() {
        return Err(KmcError::malformed(
            record,
            format!(
                "{} species columns {:?} do not match the configuration {:?}",
                kind, header, declared
            ),
        ));
    }
    Ok(())
}

/// Records of one run, read and cross-checked once
#[derive(Debug, Clone)]
pub struct LoadedRun {
    pub source: String,
    pub metadata: RunMetadata,
    pub lattice: LatticeMetadata,
    pub table: SnapshotTable,
    pub site_assignment: SiteAssignment,
}

impl LoadedRun {
    pub fn load<R: RunRecords + ?Sized>(records: &R) -> KmcResult<Self> {
        let metadata = records.run_metadata()?;
        let lattice = records.lattice_metadata()?;
        let table = records.snapshot_table()?;
        let source = records.describe();

        let record = Path::new(&source).join(SPECNUM_OUTPUT_FILE);
        let surface: Vec<&str> = table.surface().iter().map(|c| c.name.as_str()).collect();
        let gas: Vec<&str> = table.gas().iter().map(|c| c.name.as_str()).collect();
        check_species(&record, "surface", &surface, &metadata.surf_specs_names)?;
        check_species(&record, "gas", &gas, &metadata.gas_specs_names)?;

        let site_assignment = records.site_assignment(&metadata)?;
        Ok(Self {
            source,
            metadata,
            lattice,
            table,
            site_assignment,
        })
    }
}

/// Records read from the output files of a Zacros job directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Whether the directory holds the records a scan needs to consider it a run
    pub fn looks_like_run(path: &Path) -> bool {
        path.join(GENERAL_OUTPUT_FILE).is_file() && path.join(SIMULATION_INPUT_FILE).is_file()
    }
}

impl RunRecords for RunDirectory {
    fn run_metadata(&self) -> KmcResult<RunMetadata> {
        parse_simulation_input(&self.path.join(SIMULATION_INPUT_FILE))
    }

    fn lattice_metadata(&self) -> KmcResult<LatticeMetadata> {
        parse_general_output(&self.path.join(GENERAL_OUTPUT_FILE))
    }

    fn snapshot_table(&self) -> KmcResult<SnapshotTable> {
        parse_specnum_output(&self.path.join(SPECNUM_OUTPUT_FILE))
    }

    fn site_assignment(&self, metadata: &RunMetadata) -> KmcResult<SiteAssignment> {
        load_site_assignment(&self.path, metadata)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
