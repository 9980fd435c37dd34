use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::error::{KmcError, KmcResult};
use crate::structure::SnapshotTable;

/// Axis the window percentages refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeType {
    /// Percentages of the final simulated time
    Time,
    /// Percentages of the final event count
    Events,
}

impl FromStr for RangeType {
    type Err = KmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" => Ok(RangeType::Time),
            "events" | "nevents" => Ok(RangeType::Events),
            _ => Err(KmcError::InvalidRangeType(s.to_string())),
        }
    }
}

impl fmt::Display for RangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeType::Time => write!(f, "time"),
            RangeType::Events => write!(f, "events"),
        }
    }
}

/// Portion of a run to analyze, e.g. `[50, 100]` for the second half
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalysisWindow {
    start_percent: f64,
    end_percent: f64,
    range_type: RangeType,
}

impl AnalysisWindow {
    pub fn new(start_percent: f64, end_percent: f64, range_type: RangeType) -> KmcResult<Self> {
        if !start_percent.is_finite() || !end_percent.is_finite() {
            return Err(KmcError::InvalidWindow {
                what: format!("bounds must be finite, got [{}, {}]", start_percent, end_percent),
            });
        }
        if !(0.0..=100.0).contains(&start_percent)
            || !(0.0..=100.0).contains(&end_percent)
            || start_percent > end_percent
        {
            return Err(KmcError::InvalidWindow {
                what: format!(
                    "need 0 <= start <= end <= 100, got [{}, {}]",
                    start_percent, end_percent
                ),
            });
        }
        Ok(Self {
            start_percent,
            end_percent,
            range_type,
        })
    }

    /// The whole run, `[0, 100]`
    pub fn full(range_type: RangeType) -> Self {
        Self {
            start_percent: 0.0,
            end_percent: 100.0,
            range_type,
        }
    }

    pub fn start_percent(&self) -> f64 {
        self.start_percent
    }

    pub fn end_percent(&self) -> f64 {
        self.end_percent
    }

    pub fn range_type(&self) -> RangeType {
        self.range_type
    }

    /// Same percentages on a different axis
    pub fn with_range_type(self, range_type: RangeType) -> Self {
        Self { range_type, ..self }
    }
}

/// Inclusive row range selected by a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowBounds {
    pub start_idx: usize,
    pub end_idx: usize,
}

impl WindowBounds {
    /// Rows covered; a window always holds at least one row
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.end_idx - self.start_idx + 1
    }
}

/// Index of the last entry `<= threshold` on a non-decreasing axis
fn last_index_at_or_below(axis: &[f64], threshold: f64) -> Option<usize> {
    axis.partition_point(|&v| v <= threshold).checked_sub(1)
}

/// Resolve percentage bounds to row indices on a non-decreasing key axis.
///
/// `start_idx` is the last row at or before the start threshold (0 if none, or
/// when the window opens at 0 %), `end_idx` the last row at or before the end
/// threshold.
pub fn resolve_bounds(axis: &[f64], start_percent: f64, end_percent: f64) -> WindowBounds {
    if axis.is_empty() {
        return WindowBounds {
            start_idx: 0,
            end_idx: 0,
        };
    }
    let last = axis.len() - 1;
    let final_value = axis[last];
    let start_threshold = start_percent / 100.0 * final_value;
    let end_threshold = end_percent / 100.0 * final_value;

    // A window opening at 0 % starts at the first row even if several rows share t = 0
    let start_idx = if start_percent == 0.0 {
        0
    } else {
        last_index_at_or_below(axis, start_threshold).unwrap_or(0)
    };
    let end_idx = last_index_at_or_below(axis, end_threshold)
        .unwrap_or(0)
        .min(last)
        .max(start_idx);

    WindowBounds { start_idx, end_idx }
}

/// Borrowed window over a [`SnapshotTable`]
#[derive(Debug, Clone, Copy)]
pub struct SnapshotView<'a> {
    table: &'a SnapshotTable,
    bounds: WindowBounds,
    range_type: RangeType,
}

impl<'a> SnapshotView<'a> {
    pub fn bounds(&self) -> WindowBounds {
        self.bounds
    }

    pub fn range_type(&self) -> RangeType {
        self.range_type
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    fn slice(&self, column: &'a [f64]) -> &'a [f64] {
        &column[self.bounds.start_idx..=self.bounds.end_idx]
    }

    pub fn nevents(&self) -> &'a [f64] {
        self.slice(self.table.nevents())
    }

    pub fn time(&self) -> &'a [f64] {
        self.slice(self.table.time())
    }

    pub fn energy(&self) -> &'a [f64] {
        self.slice(self.table.energy())
    }

    /// Surface species columns in header order
    pub fn surface(&self) -> impl Iterator<Item = (&'a str, &'a [f64])> + 'a {
        let view = *self;
        self.table
            .surface()
            .iter()
            .map(move |c| (c.name.as_str(), view.slice(&c.values)))
    }

    /// Gas species columns in header order
    pub fn gas(&self) -> impl Iterator<Item = (&'a str, &'a [f64])> + 'a {
        let view = *self;
        self.table
            .gas()
            .iter()
            .map(move |c| (c.name.as_str(), view.slice(&c.values)))
    }

    /// Key axis the window was resolved on
    pub fn key_axis(&self) -> &'a [f64] {
        match self.range_type {
            RangeType::Time => self.time(),
            RangeType::Events => self.nevents(),
        }
    }

    /// Fewer than two rows, or no time/event progress across the window
    pub fn is_degenerate(&self) -> bool {
        if self.bounds.start_idx == self.bounds.end_idx {
            return true;
        }
        let key = self.key_axis();
        key[key.len() - 1] - key[0] == 0.0
    }
}

/// Select the rows of `table` covered by `window`. The table is not copied.
pub fn select_window<'a>(table: &'a SnapshotTable, window: &AnalysisWindow) -> SnapshotView<'a> {
    let axis = match window.range_type() {
        RangeType::Time => table.time(),
        RangeType::Events => table.nevents(),
    };
    let bounds = resolve_bounds(axis, window.start_percent(), window.end_percent());
    debug!(
        start_idx = bounds.start_idx,
        end_idx = bounds.end_idx,
        rows = table.len(),
        range_type = %window.range_type(),
        "resolved analysis window"
    );
    SnapshotView {
        table,
        bounds,
        range_type: window.range_type(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::SpeciesColumn;

    fn table() -> SnapshotTable {
        SnapshotTable::new(
            vec![0.0, 100.0, 200.0, 300.0, 400.0],
            vec![0.0, 1.0, 2.0, 8.0, 10.0],
            vec![1.0; 5],
            vec![SpeciesColumn::new("CO", vec![0.0, 1.0, 2.0, 3.0, 4.0])],
            vec![SpeciesColumn::new("CO2", vec![0.0, 5.0, 10.0, 15.0, 20.0])],
        )
        .unwrap()
    }

    #[test]
    fn test_full_window_keeps_every_row() {
        let t = table();
        let view = select_window(&t, &AnalysisWindow::full(RangeType::Time));
        assert_eq!(view.bounds(), WindowBounds { start_idx: 0, end_idx: 4 });
        assert_eq!(view.len(), t.len());
    }

    #[test]
    fn test_time_window_uses_last_row_at_or_before_threshold() {
        let t = table();
        // 50% of 10 s = 5 s -> row with t = 2
        let window = AnalysisWindow::new(50.0, 100.0, RangeType::Time).unwrap();
        let view = select_window(&t, &window);
        assert_eq!(view.bounds().start_idx, 2);
        assert_eq!(view.time(), &[2.0, 8.0, 10.0]);
        let gas: Vec<_> = view.gas().collect();
        assert_eq!(gas[0], ("CO2", &[10.0, 15.0, 20.0][..]));
    }

    #[test]
    fn test_events_window() {
        let t = table();
        let window = AnalysisWindow::new(25.0, 75.0, RangeType::Events).unwrap();
        let view = select_window(&t, &window);
        assert_eq!(view.bounds(), WindowBounds { start_idx: 1, end_idx: 3 });
        assert_eq!(view.nevents(), &[100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_zero_start_keeps_repeated_initial_rows() {
        let bounds = resolve_bounds(&[0.0, 0.0, 0.0, 5.0], 0.0, 100.0);
        assert_eq!(bounds, WindowBounds { start_idx: 0, end_idx: 3 });
        let bounds = resolve_bounds(&[0.0, 0.0, 0.0, 5.0], 1.0, 100.0);
        assert_eq!(bounds.start_idx, 2);
    }

    #[test]
    fn test_degenerate_window() {
        let t = table();
        let window = AnalysisWindow::new(85.0, 90.0, RangeType::Time).unwrap();
        let view = select_window(&t, &window);
        assert_eq!(view.len(), 1);
        assert!(view.is_degenerate());
        assert_eq!(resolve_bounds(&[7.0], 0.0, 100.0).len(), 1);
    }

    #[test]
    fn test_window_validation() {
        assert!(AnalysisWindow::new(-1.0, 50.0, RangeType::Time).is_err());
        assert!(AnalysisWindow::new(60.0, 50.0, RangeType::Time).is_err());
        assert!(AnalysisWindow::new(0.0, 100.1, RangeType::Events).is_err());
        assert!(AnalysisWindow::new(f64::NAN, 50.0, RangeType::Events).is_err());
        assert!(AnalysisWindow::new(30.0, 30.0, RangeType::Events).is_ok());
    }

    #[test]
    fn test_range_type_from_str() {
        assert_eq!("time".parse::<RangeType>().unwrap(), RangeType::Time);
        assert_eq!("nevents".parse::<RangeType>().unwrap(), RangeType::Events);
        assert_eq!("Events".parse::<RangeType>().unwrap(), RangeType::Events);
        assert!(matches!(
            "steps".parse::<RangeType>(),
            Err(KmcError::InvalidRangeType(_))
        ));
    }
}
