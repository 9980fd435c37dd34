//! Occurrences of each elementary step over an analysis window, from the
//! process-statistics record.

use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::error::{open_record, KmcError, KmcResult};
use crate::general_output::{parse_general_output, GENERAL_OUTPUT_FILE};
use crate::window::{resolve_bounds, AnalysisWindow, RangeType, WindowBounds};

pub const PROCSTAT_OUTPUT_FILE: &str = "procstat_output.txt";

/// Which occurrences of a reversible step to count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
    /// Forward minus reverse
    Net,
}

impl FromStr for Direction {
    type Err = KmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fwd" | "forward" => Ok(Direction::Forward),
            "rev" | "reverse" => Ok(Direction::Reverse),
            "net" => Ok(Direction::Net),
            _ => Err(KmcError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "fwd"),
            Direction::Reverse => write!(f, "rev"),
            Direction::Net => write!(f, "net"),
        }
    }
}

/// Occurrences of one elementary step inside the window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOccurrences {
    pub step: String,
    pub noccur_fwd: i64,
    pub noccur_rev: i64,
    pub noccur_net: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessStatistics {
    steps: Vec<StepOccurrences>,
    /// Simulated time covered by the window (s)
    delta_time: f64,
    /// Lattice surface area (Å²)
    area: f64,
    bounds: WindowBounds,
}

impl ProcessStatistics {
    /// Elementary steps in header order
    pub fn steps(&self) -> &[StepOccurrences] {
        &self.steps
    }

    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn bounds(&self) -> WindowBounds {
        self.bounds
    }

    pub fn step(&self, name: &str) -> KmcResult<&StepOccurrences> {
        self.steps
            .iter()
            .find(|s| s.step == name)
            .ok_or_else(|| KmcError::UnknownStep {
                name: name.to_string(),
            })
    }

    /// Occurrences per second per Å²
    pub fn event_frequency(&self, name: &str, direction: Direction) -> KmcResult<f64> {
        let step = self.step(name)?;
        let count = match direction {
            Direction::Forward => step.noccur_fwd,
            Direction::Reverse => step.noccur_rev,
            Direction::Net => step.noccur_net,
        };
        Ok(count as f64 / self.delta_time / self.area)
    }

    /// Write one row per elementary step
    pub fn write_csv(&self, path: &Path) -> KmcResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([
            "step",
            "noccur_fwd",
            "noccur_rev",
            "noccur_net",
            "frequency_fwd",
            "frequency_rev",
            "frequency_net",
        ])?;
        for s in &self.steps {
            let freq = |count: i64| (count as f64 / self.delta_time / self.area).to_string();
            writer.write_record([
                s.step.clone(),
                s.noccur_fwd.to_string(),
                s.noccur_rev.to_string(),
                s.noccur_net.to_string(),
                freq(s.noccur_fwd),
                freq(s.noccur_rev),
                freq(s.noccur_net),
            ])?;
        }
        writer.flush().map_err(|e| KmcError::io(path, e))?;
        Ok(())
    }
}

/// Step names from `Overall step1_fwd step1_rev ...`
fn parse_header(path: &Path, line: &str) -> KmcResult<Vec<String>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if !tokens
        .first()
        .is_some_and(|t| t.eq_ignore_ascii_case("overall"))
    {
        return Err(KmcError::malformed(path, "first header column must be 'Overall'"));
    }
    let mut steps = Vec::new();
    for pair in tokens[1..].chunks(2) {
        let base = pair[0].strip_suffix("_fwd").ok_or_else(|| {
            KmcError::malformed(path, format!("expected a '_fwd' column, got '{}'", pair[0]))
        })?;
        let expected_rev = format!("{}_rev", base);
        match pair.get(1) {
            Some(rev) if *rev == expected_rev => steps.push(base.to_string()),
            Some(rev) => {
                return Err(KmcError::malformed(
                    path,
                    format!("expected reverse column '{}', got '{}'", expected_rev, rev),
                ))
            }
            None => {
                return Err(KmcError::malformed(
                    path,
                    format!("reverse column for '{}' not found", base),
                ))
            }
        }
    }
    Ok(steps)
}

struct Block {
    nevents: f64,
    time: f64,
    counts: Vec<i64>,
}

fn parse_block(path: &Path, columns: usize, config: &str, counts: &str) -> KmcResult<Block> {
    let parts: Vec<&str> = config.split_whitespace().collect();
    if !parts
        .first()
        .is_some_and(|t| t.eq_ignore_ascii_case("configuration"))
    {
        return Err(KmcError::malformed(path, format!("expected a 'configuration' line, got '{}'", config)));
    }
    if parts.len() < 4 {
        return Err(KmcError::malformed(path, "configuration line has fewer than 4 fields"));
    }
    let nevents = parts[2].parse::<u64>().map_err(|e| {
        KmcError::malformed(path, format!("invalid event count '{}': {}", parts[2], e))
    })? as f64;
    let time = parts[3].parse::<f64>().map_err(|e| {
        KmcError::malformed(path, format!("invalid time '{}': {}", parts[3], e))
    })?;

    let counts = counts
        .split_whitespace()
        .map(|c| {
            c.parse::<i64>()
                .map_err(|e| KmcError::malformed(path, format!("invalid count '{}': {}", c, e)))
        })
        .collect::<KmcResult<Vec<i64>>>()?;
    if counts.len() != columns {
        return Err(KmcError::malformed(
            path,
            format!("counts line has {} fields, header has {}", counts.len(), columns),
        ));
    }
    Ok(Block {
        nevents,
        time,
        counts,
    })
}

/// Reduce `procstat_output.txt` at `path` over `window`.
///
/// The surface area is read from `general_output.txt` next to it. A window
/// that spans no blocks or no simulated time is a [`KmcError::DegenerateWindow`].
pub fn parse_procstat(path: &Path, window: &AnalysisWindow) -> KmcResult<ProcessStatistics> {
    let reader = open_record(path)?;
    let mut lines = Vec::new();
    for line_result in reader.lines() {
        let line = line_result.map_err(|e| KmcError::io(path, e))?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    let Some((header, data)) = lines.split_first() else {
        return Err(KmcError::malformed(path, "file is empty"));
    };
    let steps = parse_header(path, header)?;
    let columns = 1 + 2 * steps.len();

    // Trailing partial blocks come from a run that was still writing
    let blocks = data
        .chunks_exact(3)
        .map(|b| parse_block(path, columns, &b[0], &b[2]))
        .collect::<KmcResult<Vec<Block>>>()?;
    if blocks.is_empty() {
        return Err(KmcError::malformed(path, "no configuration blocks after the header"));
    }

    let axis: Vec<f64> = blocks
        .iter()
        .map(|b| match window.range_type() {
            RangeType::Time => b.time,
            RangeType::Events => b.nevents,
        })
        .collect();
    let bounds = resolve_bounds(&axis, window.start_percent(), window.end_percent());
    if bounds.start_idx == bounds.end_idx {
        return Err(KmcError::DegenerateWindow {
            what: format!(
                "{}: window [{}, {}] ({}) covers a single block",
                path.display(),
                window.start_percent(),
                window.end_percent(),
                window.range_type()
            ),
        });
    }
    let first = &blocks[bounds.start_idx];
    let last = &blocks[bounds.end_idx];
    let delta_time = last.time - first.time;
    if delta_time <= 0.0 {
        return Err(KmcError::DegenerateWindow {
            what: format!("{}: no simulated time elapses in the window", path.display()),
        });
    }

    let delta: Vec<i64> = last
        .counts
        .iter()
        .zip(&first.counts)
        .map(|(l, f)| l - f)
        .collect();
    let steps: Vec<StepOccurrences> = steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| {
            let noccur_fwd = delta[1 + 2 * i];
            let noccur_rev = delta[2 + 2 * i];
            StepOccurrences {
                step,
                noccur_fwd,
                noccur_rev,
                noccur_net: noccur_fwd - noccur_rev,
            }
        })
        .collect();

    let general = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(GENERAL_OUTPUT_FILE);
    let area = parse_general_output(&general)?.area;

    debug!(
        path = %path.display(),
        blocks = blocks.len(),
        steps = steps.len(),
        delta_time = delta_time,
        "parsed process statistics"
    );

    Ok(ProcessStatistics {
        steps,
        delta_time,
        area,
        bounds,
    })
}
