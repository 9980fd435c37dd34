use pyo3::exceptions::{PyFileNotFoundError, PyKeyError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use std::path::Path;

use crate::error::KmcError;
use crate::issues::{detect_issues_from_records, IssueThresholds};
use crate::output::KmcOutput;
use crate::records::RunDirectory;
use crate::scan::{self, ScanOptions};
use crate::stats::WeightMode;
use crate::window::{AnalysisWindow, RangeType};

fn to_py_err(e: KmcError) -> PyErr {
    match e {
        KmcError::MissingFile { .. } => PyFileNotFoundError::new_err(e.to_string()),
        KmcError::UnknownSpecies { .. }
        | KmcError::UnknownSiteType { .. }
        | KmcError::UnknownStep { .. } => PyKeyError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn parse_window(analysis_range: (f64, f64), range_type: &str) -> PyResult<AnalysisWindow> {
    let range_type = range_type.parse::<RangeType>().map_err(to_py_err)?;
    AnalysisWindow::new(analysis_range.0, analysis_range.1, range_type).map_err(to_py_err)
}

fn parse_weights(weights: Option<&str>) -> PyResult<WeightMode> {
    weights
        .map(|w| w.parse::<WeightMode>().map_err(to_py_err))
        .unwrap_or(Ok(WeightMode::None))
}

/// Python binding for KmcOutput: dict of the derived quantities of one run
#[pyfunction]
#[pyo3(signature = (job_path, analysis_range=(0.0, 100.0), range_type="time", weights=None))]
fn kmc_output(
    py: Python<'_>,
    job_path: &str,
    analysis_range: (f64, f64),
    range_type: &str,
    weights: Option<&str>,
) -> PyResult<PyObject> {
    let window = parse_window(analysis_range, range_type)?;
    let output = KmcOutput::new(job_path, window, parse_weights(weights)?).map_err(to_py_err)?;

    let py_dict = PyDict::new_bound(py);
    py_dict.set_item("random_seed", output.random_seed())?;
    py_dict.set_item("temperature", output.temperature())?;
    py_dict.set_item("pressure", output.pressure())?;
    py_dict.set_item("gas_specs_names", output.gas_specs_names().to_vec())?;
    py_dict.set_item("surf_specs_names", output.surf_specs_names().to_vec())?;
    py_dict.set_item("n_sites", output.n_sites())?;
    py_dict.set_item("area", output.area())?;
    py_dict.set_item("site_types", output.site_types().clone())?;
    py_dict.set_item("nevents", output.nevents().to_vec())?;
    py_dict.set_item("time", output.time().to_vec())?;
    py_dict.set_item("finaltime", output.final_time())?;
    py_dict.set_item("energy", output.energy().to_vec())?;
    py_dict.set_item("av_energy", output.av_energy())?;
    py_dict.set_item("final_energy", output.final_energy())?;
    py_dict.set_item("energyslope", output.energy_slope())?;

    let py_production = PyDict::new_bound(py);
    let py_total_production = PyDict::new_bound(py);
    for gas in output.gas_specs_names() {
        py_production.set_item(gas, output.production(gas).map_err(to_py_err)?.to_vec())?;
        py_total_production.set_item(gas, output.total_production(gas).map_err(to_py_err)?)?;
    }
    py_dict.set_item("production", py_production)?;
    py_dict.set_item("total_production", py_total_production)?;
    py_dict.set_item("tof", output.tof_map())?;

    let coverages = output.coverages();
    let py_coverage = PyDict::new_bound(py);
    for species in coverages.species() {
        py_coverage.set_item(species, coverages.coverage(species).map_err(to_py_err)?.to_vec())?;
    }
    py_dict.set_item("coverage", py_coverage)?;
    py_dict.set_item("av_coverage", coverages.av_coverage().clone())?;
    py_dict.set_item("total_coverage", coverages.total_coverage_series().to_vec())?;
    py_dict.set_item("av_total_coverage", coverages.av_total_coverage())?;
    py_dict.set_item("dominant_ads", coverages.dominant_ads())?;

    let py_cov_site = PyDict::new_bound(py);
    let py_total_site = PyDict::new_bound(py);
    let py_av_total_site = PyDict::new_bound(py);
    for (site_type, site) in coverages.site_types() {
        py_cov_site.set_item(site_type, site.coverage.clone())?;
        py_total_site.set_item(site_type, site.total_coverage.clone())?;
        py_av_total_site.set_item(site_type, site.av_total_coverage)?;
    }
    py_dict.set_item("coverage_per_site_type", py_cov_site)?;
    py_dict.set_item("av_coverage_per_site_type", output.av_coverage_per_site_type())?;
    py_dict.set_item("total_coverage_per_site_type", py_total_site)?;
    py_dict.set_item("av_total_coverage_per_site_type", py_av_total_site)?;
    py_dict.set_item("dominant_ads_per_site_type", output.dominant_ads_per_site_type())?;

    Ok(py_dict.into())
}

/// Python binding for the steady-state check; `True` when the run looks suspect
#[pyfunction]
#[pyo3(signature = (job_path, analysis_range=(0.0, 100.0), energy_slope_threshold=5.0e-10, r2_threshold=0.95, max_points=100))]
fn detect_issues(
    job_path: &str,
    analysis_range: (f64, f64),
    energy_slope_threshold: f64,
    r2_threshold: f64,
    max_points: usize,
) -> PyResult<bool> {
    let window = parse_window(analysis_range, "events")?;
    let thresholds = IssueThresholds {
        energy_slope_threshold,
        r2_threshold,
        max_points,
    };
    let verdict = detect_issues_from_records(&RunDirectory::new(job_path), window, &thresholds)
        .map_err(to_py_err)?;
    Ok(verdict.has_issues)
}

/// Python binding for read_scan: one dict per run, optionally saved as CSV
#[pyfunction]
#[pyo3(signature = (scan_path, analysis_range=(0.0, 100.0), range_type="time", weights=None, check_issues=true, output_csv=None))]
fn read_scan(
    py: Python<'_>,
    scan_path: &str,
    analysis_range: (f64, f64),
    range_type: &str,
    weights: Option<&str>,
    check_issues: bool,
    output_csv: Option<&str>,
) -> PyResult<PyObject> {
    let options = ScanOptions {
        window: parse_window(analysis_range, range_type)?,
        weights: parse_weights(weights)?,
        detect_issues: check_issues,
        ..ScanOptions::default()
    };
    let rows = py
        .allow_threads(|| scan::read_scan(Path::new(scan_path), &options))
        .map_err(to_py_err)?;
    if let Some(csv_path) = output_csv {
        scan::write_scan_csv(&rows, Path::new(csv_path)).map_err(to_py_err)?;
    }

    let py_rows = PyList::empty_bound(py);
    for row in &rows {
        let py_dict = PyDict::new_bound(py);
        py_dict.set_item("name", &row.name)?;
        py_dict.set_item("temperature", row.temperature)?;
        py_dict.set_item("pressure", row.pressure)?;
        py_dict.set_item("tof", row.tof.clone())?;
        py_dict.set_item("av_coverage_per_site_type", row.av_coverage.clone())?;
        py_dict.set_item("dominant_ads_per_site_type", row.dominant_ads.clone())?;
        py_dict.set_item("energyslope", row.energy_slope)?;
        py_dict.set_item("finaltime", row.final_time)?;
        py_dict.set_item("has_issues", row.has_issues)?;
        py_dict.set_item("error", row.error.clone())?;
        py_rows.append(py_dict)?;
    }
    Ok(py_rows.into())
}

/// Python module definition
#[pymodule]
fn kmc_analysis_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(kmc_output, m)?)?;
    m.add_function(wrap_pyfunction!(detect_issues, m)?)?;
    m.add_function(wrap_pyfunction!(read_scan, m)?)?;
    m.add("__doc__", "Zacros KMC output analysis Rust library with Python bindings")?;
    Ok(())
}
