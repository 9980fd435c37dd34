//! Averages and least-squares helpers shared by the rate, coverage and issue
//! computations.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

use crate::error::{KmcError, KmcResult};

/// Peak-to-peak variation below which a cumulative molecule count is flat
pub const PRODUCTION_TOLERANCE: f64 = 1e-18;

/// Peak-to-peak variation below which the lattice energy (eV/Å²) is flat
pub const ENERGY_TOLERANCE: f64 = 1e-12;

/// Weighting applied when averaging a windowed series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMode {
    /// Plain arithmetic mean over every row
    None,
    /// Each sample weighted by the time elapsed before it was recorded
    Time,
    /// Each sample weighted by the events executed before it was recorded
    Events,
}

impl FromStr for WeightMode {
    type Err = KmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(WeightMode::None),
            "time" => Ok(WeightMode::Time),
            "nevents" | "events" => Ok(WeightMode::Events),
            _ => Err(KmcError::InvalidWeightMode(s.to_string())),
        }
    }
}

impl fmt::Display for WeightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightMode::None => write!(f, "none"),
            WeightMode::Time => write!(f, "time"),
            WeightMode::Events => write!(f, "nevents"),
        }
    }
}

/// Average `series` over a window whose time and event axes are `time` and `nevents`.
///
/// A single sample is returned unchanged: when the lattice is poisoned the last
/// time step can be so long that the window holds one row only. Weighted modes
/// drop the first sample, which has no preceding interval.
pub fn average(series: &[f64], mode: WeightMode, time: &[f64], nevents: &[f64]) -> KmcResult<f64> {
    match series.len() {
        0 => {
            return Err(KmcError::InsufficientData {
                what: "cannot average an empty series".to_string(),
            })
        }
        1 => return Ok(series[0]),
        _ => {}
    }

    let axis = match mode {
        WeightMode::None => return Ok(mean(series)),
        WeightMode::Time => time,
        WeightMode::Events => nevents,
    };
    if axis.len() != series.len() {
        return Err(KmcError::InsufficientData {
            what: format!(
                "weight axis has {} samples but the series has {}",
                axis.len(),
                series.len()
            ),
        });
    }

    let weights = diff(axis);
    match weighted_mean(&series[1..], &weights) {
        Some(avg) => Ok(avg),
        None => {
            warn!(mode = %mode, "weights sum to zero, using the last sample");
            Ok(series[series.len() - 1])
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// `None` when the weights sum to zero
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return None;
    }
    let acc: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Some(acc / total)
}

/// Consecutive differences, one shorter than the input
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

pub fn peak_to_peak(values: &[f64]) -> f64 {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if values.is_empty() {
        0.0
    } else {
        max - min
    }
}

/// First-degree least-squares fit `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares; `None` with fewer than two points or a constant `x`
pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mean_x = mean(x);
    let mean_y = mean(y);
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        sxx += dx * dx;
        sxy += dx * (yi - mean_y);
    }
    if sxx <= 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Squared Pearson correlation; NaN when either series is constant
pub fn pearson_r_squared(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return f64::NAN;
    }
    let mean_a = mean(a);
    let mean_b = mean(b);
    let mut saa = 0.0;
    let mut sbb = 0.0;
    let mut sab = 0.0;
    for (&ai, &bi) in a.iter().zip(b) {
        let da = ai - mean_a;
        let db = bi - mean_b;
        saa += da * da;
        sbb += db * db;
        sab += da * db;
    }
    if saa == 0.0 || sbb == 0.0 {
        return f64::NAN;
    }
    let r = sab / (saa * sbb).sqrt();
    r * r
}

/// Evenly spaced indices that keep at most `max_points` of `len` samples,
/// always including the first and last.
pub fn downsample_indices(len: usize, max_points: usize) -> Vec<usize> {
    if len <= max_points {
        return (0..len).collect();
    }
    match max_points {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let step = (len - 1) as f64 / (max_points - 1) as f64;
            let mut indices: Vec<usize> = (0..max_points)
                .map(|i| (i as f64 * step).round_ties_even() as usize)
                .collect();
            indices[max_points - 1] = len - 1;
            indices
        }
    }
}

pub fn take_indices(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| values[i]).collect()
}
