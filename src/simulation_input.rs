use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{open_record, KmcError, KmcResult};
use crate::structure::{ReportingScheme, RunMetadata};

pub const SIMULATION_INPUT_FILE: &str = "simulation_input.dat";

fn parse_token<T: FromStr>(path: &Path, key: &str, token: &str) -> KmcResult<T>
where
    T::Err: std::fmt::Display,
{
    token.parse::<T>().map_err(|e| {
        KmcError::malformed(path, format!("invalid value '{}' for '{}': {}", token, key, e))
    })
}

fn parse_list<T: FromStr>(path: &Path, key: &str, tokens: &[&str]) -> KmcResult<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    tokens.iter().map(|t| parse_token(path, key, t)).collect()
}

fn first_value<'a>(path: &Path, key: &str, tokens: &[&'a str]) -> KmcResult<&'a str> {
    tokens
        .first()
        .copied()
        .ok_or_else(|| KmcError::malformed(path, format!("keyword '{}' has no value", key)))
}

fn check_len(path: &Path, what: &str, declared: usize, found: usize) -> KmcResult<()> {
    if declared != found {
        return Err(KmcError::malformed(
            path,
            format!("{} lists {} entries but {} were declared", what, found, declared),
        ));
    }
    Ok(())
}

/// Parse the run-configuration record (`simulation_input.dat`).
///
/// Lines are `keyword value...`; anything after `#` is ignored. Surface species
/// names lose their trailing `*` markers.
pub fn parse_simulation_input(path: &Path) -> KmcResult<RunMetadata> {
    let reader = open_record(path)?;

    let mut random_seed = None;
    let mut temperature = None;
    let mut pressure = None;
    let mut n_gas_species: Option<usize> = None;
    let mut n_surf_species: Option<usize> = None;
    let mut gas_specs_names = Vec::new();
    let mut gas_energies = Vec::new();
    let mut gas_molec_weights = Vec::new();
    let mut gas_molar_fracs = Vec::new();
    let mut surf_specs_names = Vec::new();
    let mut surf_specs_dent = Vec::new();
    let mut reporting = ReportingScheme::default();

    for (line_no, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| KmcError::io(path, e))?;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = content.split_whitespace().collect();
        let key = tokens[0];
        let values = &tokens[1..];
        let joined = || values.join(" ");

        match key {
            "random_seed" => {
                random_seed = Some(parse_token(path, key, first_value(path, key, values)?)?)
            }
            "temperature" => {
                // `temperature ramp T0 rate` starts from T0
                let token = match values {
                    ["ramp", t0, ..] => *t0,
                    _ => first_value(path, key, values)?,
                };
                temperature = Some(parse_token::<f64>(path, key, token)?);
            }
            "pressure" => pressure = Some(parse_token(path, key, first_value(path, key, values)?)?),
            "n_gas_species" => {
                n_gas_species = Some(parse_token(path, key, first_value(path, key, values)?)?)
            }
            "n_surf_species" => {
                n_surf_species = Some(parse_token(path, key, first_value(path, key, values)?)?)
            }
            "gas_specs_names" => gas_specs_names = values.iter().map(|s| s.to_string()).collect(),
            "gas_energies" => gas_energies = parse_list(path, key, values)?,
            "gas_molec_weights" => gas_molec_weights = parse_list(path, key, values)?,
            "gas_molar_fracs" => gas_molar_fracs = parse_list(path, key, values)?,
            "surf_specs_names" => {
                surf_specs_names = values
                    .iter()
                    .map(|s| s.trim_end_matches('*').to_string())
                    .collect()
            }
            "surf_specs_dent" => surf_specs_dent = parse_list(path, key, values)?,
            "snapshots" => reporting.snapshots = Some(joined()),
            "process_statistics" => reporting.process_statistics = Some(joined()),
            "species_numbers" => reporting.species_numbers = Some(joined()),
            "max_steps" => reporting.max_steps = Some(joined()),
            "max_time" => reporting.max_time = Some(joined()),
            "wall_time" => reporting.wall_time = Some(joined()),
            _ => {
                debug!(line = line_no + 1, keyword = key, "skipping keyword");
            }
        }
    }

    let temperature = temperature
        .ok_or_else(|| KmcError::malformed(path, "missing keyword 'temperature'"))?;
    let pressure =
        pressure.ok_or_else(|| KmcError::malformed(path, "missing keyword 'pressure'"))?;

    let n_gas = n_gas_species.unwrap_or(gas_specs_names.len());
    check_len(path, "gas_specs_names", n_gas, gas_specs_names.len())?;
    for (what, list_len) in [
        ("gas_energies", gas_energies.len()),
        ("gas_molec_weights", gas_molec_weights.len()),
        ("gas_molar_fracs", gas_molar_fracs.len()),
    ] {
        if list_len != 0 {
            check_len(path, what, n_gas, list_len)?;
        }
    }

    let n_surf = n_surf_species.unwrap_or(surf_specs_names.len());
    check_len(path, "surf_specs_names", n_surf, surf_specs_names.len())?;
    check_len(path, "surf_specs_dent", n_surf, surf_specs_dent.len())?;
    if let Some(idx) = surf_specs_dent.iter().position(|&d| d == 0) {
        return Err(KmcError::malformed(
            path,
            format!("surface species '{}' has zero dentation", surf_specs_names[idx]),
        ));
    }

    debug!(
        path = %path.display(),
        gas = n_gas,
        surface = n_surf,
        "parsed run configuration"
    );

    Ok(RunMetadata {
        random_seed,
        temperature,
        pressure,
        gas_specs_names,
        gas_energies,
        gas_molec_weights,
        gas_molar_fracs,
        surf_specs_names,
        surf_specs_dent,
        reporting,
    })
}
