use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use crate::error::{open_record, KmcError, KmcResult};
use crate::structure::{RunMetadata, SiteAssignment};

pub const ENERGETICS_INPUT_FILE: &str = "energetics_input.dat";
pub const LATTICE_INPUT_FILE: &str = "lattice_input.dat";

/// Site type name Zacros gives the single site type of a default lattice
pub const DEFAULT_SITE_TYPE: &str = "StTp1";

/// Whether `lattice_input.dat` selects one of the built-in lattices.
///
/// A missing lattice file is reported as `false`; the energetics record then
/// decides the assignment.
pub fn is_default_lattice(path: &Path) -> KmcResult<bool> {
    let reader = match open_record(path) {
        Ok(reader) => reader,
        Err(KmcError::MissingFile { .. }) => return Ok(false),
        Err(e) => return Err(e),
    };
    for line_result in reader.lines() {
        let line = line_result.map_err(|e| KmcError::io(path, e))?;
        let content = line.split('#').next().unwrap_or("");
        let mut tokens = content.split_whitespace();
        if tokens.next() == Some("lattice") && tokens.next() == Some("default_choice") {
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Default)]
struct Cluster {
    species: Vec<String>,
    site_types: Vec<String>,
    first_line: usize,
}

/// Read the `cluster ... end_cluster` blocks of an energetics record.
///
/// Inside `lattice_state`, only lines starting with an integer site index name
/// a species; `site_types` lists one site type per lattice_state entry.
fn read_clusters(path: &Path) -> KmcResult<Vec<Cluster>> {
    let reader = open_record(path)?;
    let mut clusters = Vec::new();
    let mut current: Option<Cluster> = None;
    let mut in_lattice_state = false;

    for (line_idx, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| KmcError::io(path, e))?;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = content.split_whitespace().collect();

        if tokens[0] == "end_cluster" {
            in_lattice_state = false;
            clusters.extend(current.take());
            continue;
        }
        if current.is_none() {
            if tokens[0] == "cluster" {
                current = Some(Cluster {
                    first_line: line_idx + 1,
                    ..Cluster::default()
                });
            }
            continue;
        }
        let Some(cluster) = current.as_mut() else {
            continue;
        };

        match tokens[0] {
            "lattice_state" => in_lattice_state = true,
            "site_types" => {
                in_lattice_state = false;
                cluster.site_types = tokens[1..].iter().map(|s| s.to_string()).collect();
            }
            "cluster_eng" | "neighboring" | "sites" | "graph_multiplicity" | "angles" => {
                in_lattice_state = false;
            }
            first if in_lattice_state && first.parse::<u64>().is_ok() => {
                let species = tokens.get(1).ok_or_else(|| {
                    KmcError::malformed(
                        path,
                        format!("line {}: lattice_state entry has no species", line_idx + 1),
                    )
                })?;
                cluster
                    .species
                    .push(species.trim_end_matches('*').to_string());
            }
            _ => {}
        }
    }

    if let Some(open) = current {
        return Err(KmcError::malformed(
            path,
            format!("cluster starting at line {} has no end_cluster", open.first_line),
        ));
    }
    Ok(clusters)
}

/// Site type of every surface species, from the energetics cluster definitions
pub fn parse_site_assignment(path: &Path, metadata: &RunMetadata) -> KmcResult<SiteAssignment> {
    let clusters = read_clusters(path)?;
    let mut assignment = SiteAssignment::new();

    for cluster in &clusters {
        if cluster.species.len() != cluster.site_types.len() {
            return Err(KmcError::InconsistentModel {
                what: format!(
                    "cluster at line {} of {} lists {} species but {} site types",
                    cluster.first_line,
                    path.display(),
                    cluster.species.len(),
                    cluster.site_types.len()
                ),
            });
        }
        for (species, site_type) in cluster.species.iter().zip(&cluster.site_types) {
            if !metadata.surf_specs_names.contains(species) {
                return Err(KmcError::InconsistentModel {
                    what: format!(
                        "species '{}' declared in {} but not in surf_specs_names",
                        species,
                        path.display()
                    ),
                });
            }
            assignment.assign(species, site_type)?;
        }
    }

    for species in &metadata.surf_specs_names {
        if assignment.site_type_of(species).is_err() {
            return Err(KmcError::InconsistentModel {
                what: format!(
                    "species '{}' declared in surf_specs_names but not found in {}",
                    species,
                    path.display()
                ),
            });
        }
    }

    debug!(
        path = %path.display(),
        clusters = clusters.len(),
        species = assignment.len(),
        "parsed site type assignment"
    );
    Ok(assignment)
}

/// Site assignment of a run directory: uniform on default lattices, otherwise
/// read from the energetics record.
pub fn load_site_assignment(run_dir: &Path, metadata: &RunMetadata) -> KmcResult<SiteAssignment> {
    if is_default_lattice(&run_dir.join(LATTICE_INPUT_FILE))? {
        return Ok(SiteAssignment::uniform(
            &metadata.surf_specs_names,
            DEFAULT_SITE_TYPE,
        ));
    }
    parse_site_assignment(&run_dir.join(ENERGETICS_INPUT_FILE), metadata)
}
