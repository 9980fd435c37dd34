use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use crate::error::{open_record, KmcError, KmcResult};
use crate::structure::LatticeMetadata;

pub const GENERAL_OUTPUT_FILE: &str = "general_output.txt";

const SITE_TYPE_HEADERS: [&str; 2] = [
    "Site type names and total number of sites of that type:",
    "Site type names and number of sites of that type:",
];

fn value_after<'a>(line: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes
        .iter()
        .find_map(|p| line.strip_prefix(p))
        .map(str::trim)
}

/// Parse a site type entry, either `tC (72)` or `StTp1 40`
fn parse_site_type_line(line: &str) -> Option<(String, Result<u64, String>)> {
    if let Some((name, rest)) = line.split_once('(') {
        let count = rest.split(')').next().unwrap_or("").trim();
        return Some((
            name.trim().to_string(),
            count.parse::<u64>().map_err(|e| format!("{}: {}", count, e)),
        ));
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() == 2 {
        return Some((
            parts[0].to_string(),
            parts[1].parse::<u64>().map_err(|e| format!("{}: {}", parts[1], e)),
        ));
    }
    None
}

/// Parse the lattice/general-info record (`general_output.txt`)
pub fn parse_general_output(path: &Path) -> KmcResult<LatticeMetadata> {
    let reader = open_record(path)?;

    let mut version = None;
    let mut n_sites = None;
    let mut area = None;
    let mut site_types = BTreeMap::new();
    let mut final_time = None;
    let mut final_nevents = None;

    let mut in_site_types = false;
    let mut in_stopped = false;

    for line_result in reader.lines() {
        let raw = line_result.map_err(|e| KmcError::io(path, e))?;
        let line = raw.trim();

        if version.is_none() && line.starts_with('|') && line.to_uppercase().contains("ZACROS") {
            let tokens: Vec<&str> = line.trim_matches('|').split_whitespace().collect();
            version = tokens
                .iter()
                .position(|t| t.eq_ignore_ascii_case("ZACROS"))
                .and_then(|idx| tokens.get(idx + 1))
                .map(|v| v.to_string());
            continue;
        }

        if in_site_types {
            if line.is_empty() {
                in_site_types = false;
                continue;
            }
            match parse_site_type_line(line) {
                Some((name, Ok(count))) => {
                    site_types.insert(name, count);
                    continue;
                }
                Some((name, Err(e))) => {
                    return Err(KmcError::malformed(
                        path,
                        format!("invalid site count for site type '{}': {}", name, e),
                    ))
                }
                None => in_site_types = false,
            }
        }

        if SITE_TYPE_HEADERS.iter().any(|h| line.starts_with(h)) {
            in_site_types = true;
            continue;
        }
        if line.starts_with("Simulation stopped:") {
            in_stopped = true;
            continue;
        }

        if let Some(v) = value_after(line, &["Total number of lattice sites:", "Number of lattice sites:"]) {
            n_sites = Some(v.parse::<u64>().map_err(|e| {
                KmcError::malformed(path, format!("invalid number of lattice sites '{}': {}", v, e))
            })?);
        } else if let Some(v) = value_after(line, &["Lattice surface area:", "Surface area:"]) {
            area = Some(v.parse::<f64>().map_err(|e| {
                KmcError::malformed(path, format!("invalid surface area '{}': {}", v, e))
            })?);
        } else if in_stopped {
            if let Some(v) = value_after(line, &["Current KMC time:"]) {
                final_time = v.parse::<f64>().ok();
            } else if let Some(v) = value_after(line, &["Events occurred:"]) {
                final_nevents = v.parse::<u64>().ok();
            } else if line.is_empty() {
                in_stopped = false;
            }
        }
    }

    let n_sites = n_sites
        .ok_or_else(|| KmcError::malformed(path, "missing total number of lattice sites"))?;
    let area = area.ok_or_else(|| KmcError::malformed(path, "missing lattice surface area"))?;
    if n_sites == 0 || area <= 0.0 {
        return Err(KmcError::malformed(
            path,
            format!("non-positive lattice size (sites={}, area={})", n_sites, area),
        ));
    }
    if site_types.is_empty() {
        return Err(KmcError::malformed(path, "missing site type names and counts"));
    }

    debug!(
        path = %path.display(),
        n_sites = n_sites,
        area = area,
        site_types = site_types.len(),
        "parsed general output"
    );

    Ok(LatticeMetadata {
        n_sites,
        area,
        site_types,
        version,
        final_time,
        final_nevents,
    })
}
