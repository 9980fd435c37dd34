use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use crate::error::{open_record, KmcError, KmcResult};
use crate::structure::{SnapshotTable, SpeciesColumn};

pub const SPECNUM_OUTPUT_FILE: &str = "specnum_output.txt";

fn column_index(path: &Path, header: &[String], name: &str) -> KmcResult<usize> {
    header
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| KmcError::malformed(path, format!("header has no '{}' column", name)))
}

/// Parse the time-series record (`specnum_output.txt`).
///
/// Columns after `Energy` whose name ends with `*` are surface species (stored
/// without the marker); the remaining ones are gas species.
pub fn parse_specnum_output(path: &Path) -> KmcResult<SnapshotTable> {
    let reader = open_record(path)?;
    let mut lines = reader.lines().enumerate();

    let header: Vec<String> = loop {
        match lines.next() {
            Some((_, line_result)) => {
                let line = line_result.map_err(|e| KmcError::io(path, e))?;
                if !line.trim().is_empty() {
                    break line.split_whitespace().map(str::to_string).collect();
                }
            }
            None => return Err(KmcError::malformed(path, "file is empty")),
        }
    };

    let nevents_col = column_index(path, &header, "Nevents")?;
    let time_col = column_index(path, &header, "Time")?;
    let energy_col = column_index(path, &header, "Energy")?;

    let mut surface_cols = Vec::new();
    let mut gas_cols = Vec::new();
    for (idx, name) in header.iter().enumerate().skip(energy_col + 1) {
        if name.ends_with('*') {
            surface_cols.push((idx, name.trim_end_matches('*').to_string()));
        } else {
            gas_cols.push((idx, name.clone()));
        }
    }

    let mut nevents = Vec::new();
    let mut time = Vec::new();
    let mut energy = Vec::new();
    let mut surface: Vec<Vec<f64>> = vec![Vec::new(); surface_cols.len()];
    let mut gas: Vec<Vec<f64>> = vec![Vec::new(); gas_cols.len()];

    for (line_idx, line_result) in lines {
        let line = line_result.map_err(|e| KmcError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != header.len() {
            return Err(KmcError::malformed(
                path,
                format!(
                    "line {} has {} fields, header has {}",
                    line_idx + 1,
                    fields.len(),
                    header.len()
                ),
            ));
        }
        let value = |col: usize| -> KmcResult<f64> {
            fields[col].parse::<f64>().map_err(|e| {
                KmcError::malformed(
                    path,
                    format!(
                        "line {}: invalid value '{}' in column '{}': {}",
                        line_idx + 1,
                        fields[col],
                        header[col],
                        e
                    ),
                )
            })
        };

        nevents.push(value(nevents_col)?);
        time.push(value(time_col)?);
        energy.push(value(energy_col)?);
        for (values, (col, _)) in surface.iter_mut().zip(&surface_cols) {
            values.push(value(*col)?);
        }
        for (values, (col, _)) in gas.iter_mut().zip(&gas_cols) {
            values.push(value(*col)?);
        }
    }

    if nevents.is_empty() {
        return Err(KmcError::malformed(path, "no snapshot rows after the header"));
    }
    if let Some(idx) = time.windows(2).position(|w| w[1] < w[0]) {
        return Err(KmcError::malformed(
            path,
            format!("time decreases after row {}", idx + 1),
        ));
    }
    if let Some(idx) = nevents.windows(2).position(|w| w[1] < w[0]) {
        return Err(KmcError::malformed(
            path,
            format!("event count decreases after row {}", idx + 1),
        ));
    }

    debug!(
        path = %path.display(),
        rows = nevents.len(),
        surface = surface_cols.len(),
        gas = gas_cols.len(),
        "parsed species numbers"
    );

    let surface = surface_cols
        .into_iter()
        .zip(surface)
        .map(|((_, name), values)| SpeciesColumn::new(name, values))
        .collect();
    let gas = gas_cols
        .into_iter()
        .zip(gas)
        .map(|((_, name), values)| SpeciesColumn::new(name, values))
        .collect();

    SnapshotTable::new(nevents, time, energy, surface, gas)
}
