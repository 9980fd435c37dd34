use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{KmcError, KmcResult};
use crate::issues::{diagnose_loaded, IssueThresholds};
use crate::output::KmcOutput;
use crate::records::{LoadedRun, RunDirectory};
use crate::stats::WeightMode;
use crate::window::{AnalysisWindow, RangeType};

/// How each run of a scan is reduced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanOptions {
    pub window: AnalysisWindow,
    pub weights: WeightMode,
    /// Run the steady-state checks for every run
    pub detect_issues: bool,
    pub thresholds: IssueThresholds,
    pub show_progress: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            window: AnalysisWindow::full(RangeType::Time),
            weights: WeightMode::None,
            detect_issues: true,
            thresholds: IssueThresholds::default(),
            show_progress: false,
        }
    }
}

/// Observables of one run of a scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRow {
    /// Name of the run sub-directory
    pub name: String,
    pub path: PathBuf,
    pub temperature: f64,
    pub pressure: f64,
    /// Gas species -> TOF
    pub tof: BTreeMap<String, f64>,
    /// Site type -> species -> average coverage on that site type
    pub av_coverage: BTreeMap<String, BTreeMap<String, f64>>,
    /// Site type -> dominant adsorbate
    pub dominant_ads: BTreeMap<String, Option<String>>,
    pub energy_slope: f64,
    pub final_time: f64,
    /// `None` when the checks were skipped or could not run
    pub has_issues: Option<bool>,
    /// Why the run could not be reduced
    pub error: Option<String>,
}

impl ScanRow {
    fn failed(name: String, path: PathBuf, error: &KmcError) -> Self {
        Self {
            name,
            path,
            temperature: f64::NAN,
            pressure: f64::NAN,
            tof: BTreeMap::new(),
            av_coverage: BTreeMap::new(),
            dominant_ads: BTreeMap::new(),
            energy_slope: f64::NAN,
            final_time: f64::NAN,
            has_issues: None,
            error: Some(error.to_string()),
        }
    }

    /// Column name -> value, the way [`write_scan_csv`] lays the row out
    pub fn columns(&self) -> BTreeMap<String, String> {
        let mut columns = BTreeMap::new();
        columns.insert("temperature".to_string(), self.temperature.to_string());
        columns.insert("pressure".to_string(), self.pressure.to_string());
        for (gas, tof) in &self.tof {
            columns.insert(format!("tof_{}", gas), tof.to_string());
        }
        for (site_type, species) in &self.av_coverage {
            for (name, value) in species {
                columns.insert(format!("avcov_{}_{}", site_type, name), value.to_string());
            }
        }
        for (site_type, dominant) in &self.dominant_ads {
            columns.insert(
                format!("dominant_ads_{}", site_type),
                dominant.clone().unwrap_or_default(),
            );
        }
        columns.insert("energy_slope".to_string(), self.energy_slope.to_string());
        columns.insert("final_time".to_string(), self.final_time.to_string());
        columns.insert(
            "has_issues".to_string(),
            self.has_issues.map(|b| b.to_string()).unwrap_or_default(),
        );
        columns.insert("error".to_string(), self.error.clone().unwrap_or_default());
        columns
    }
}

fn reduce_run(name: String, path: PathBuf, options: &ScanOptions) -> ScanRow {
    let reduced = LoadedRun::load(&RunDirectory::new(&path)).and_then(|run| {
        KmcOutput::from_loaded(&run, options.window, options.weights).map(|output| (run, output))
    });
    let (run, output) = match reduced {
        Ok(reduced) => reduced,
        Err(e) => {
            warn!(run = %name, error = %e, "could not process run");
            return ScanRow::failed(name, path, &e);
        }
    };

    let has_issues = if options.detect_issues {
        match diagnose_loaded(&run, options.window, &options.thresholds) {
            Ok(verdict) => Some(verdict.has_issues),
            Err(e) => {
                warn!(run = %name, error = %e, "could not check steady state");
                None
            }
        }
    } else {
        None
    };

    ScanRow {
        temperature: output.temperature(),
        pressure: output.pressure(),
        tof: output.tof_map(),
        av_coverage: output.av_coverage_per_site_type(),
        dominant_ads: output.dominant_ads_per_site_type(),
        energy_slope: output.energy_slope(),
        final_time: output.final_time(),
        has_issues,
        error: None,
        name,
        path,
    }
}

/// Sub-directories of `scan_dir` that hold a run, sorted by name
fn run_directories(scan_dir: &Path) -> KmcResult<Vec<(String, PathBuf)>> {
    if !scan_dir.is_dir() {
        return Err(KmcError::MissingFile {
            path: scan_dir.to_path_buf(),
        });
    }
    let entries = fs::read_dir(scan_dir).map_err(|e| KmcError::io(scan_dir, e))?;
    let mut subfolders = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| KmcError::io(scan_dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            subfolders.push((entry.file_name().to_string_lossy().to_string(), path));
        }
    }
    if subfolders.is_empty() {
        return Err(KmcError::InsufficientData {
            what: format!("scan directory {} is empty", scan_dir.display()),
        });
    }
    subfolders.retain(|(_, path)| RunDirectory::looks_like_run(path));
    subfolders.sort();
    Ok(subfolders)
}

/// Reduce every run of a parameter scan in parallel.
///
/// Runs that fail are kept as rows with `error` set; only a missing or empty
/// scan directory fails the whole call.
pub fn read_scan(scan_dir: &Path, options: &ScanOptions) -> KmcResult<Vec<ScanRow>> {
    let runs = run_directories(scan_dir)?;

    let pb = if options.show_progress {
        ProgressBar::new(runs.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} runs ({percent}%) | ETA: {eta}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message("Reducing scan");

    let rows: Vec<ScanRow> = runs
        .into_par_iter()
        .map(|(name, path)| {
            let row = reduce_run(name, path, options);
            pb.inc(1);
            row
        })
        .collect();
    pb.finish_with_message("Scan complete");

    let failed = rows.iter().filter(|r| r.error.is_some()).count();
    let flagged = rows.iter().filter(|r| r.has_issues == Some(true)).count();
    info!(
        scan = %scan_dir.display(),
        runs = rows.len(),
        failed = failed,
        with_issues = flagged,
        "scan reduced"
    );
    Ok(rows)
}

/// Write one CSV row per run. The header is `name` followed by the union of
/// all row columns in sorted order; absent values are left empty.
pub fn write_scan_csv(rows: &[ScanRow], output_path: &Path) -> KmcResult<()> {
    let columns: Vec<BTreeMap<String, String>> = rows.iter().map(ScanRow::columns).collect();
    let header: BTreeSet<&str> = columns
        .iter()
        .flat_map(|c| c.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_path(output_path)?;
    let mut record = vec!["name"];
    record.extend(header.iter().copied());
    writer.write_record(&record)?;

    for (row, values) in rows.iter().zip(&columns) {
        let mut record = vec![row.name.as_str()];
        record.extend(
            header
                .iter()
                .map(|column| values.get(*column).map(String::as_str).unwrap_or("")),
        );
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|e| KmcError::io(output_path, e))?;
    Ok(())
}
