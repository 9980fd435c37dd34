pub mod coverage;
pub mod energetics;
pub mod error;
pub mod general_output;
pub mod issues;
pub mod output;
pub mod procstat;
pub mod rates;
pub mod records;
pub mod scan;
pub mod simulation_input;
pub mod specnum;
pub mod stats;
pub mod structure;
pub mod window;

#[cfg(feature = "python")]
pub mod python_bindings;

// Re-export commonly used types and functions
pub use coverage::{CoverageSummary, SiteTypeCoverage};
pub use error::{KmcError, KmcResult};
pub use issues::{
    detect_issues, detect_issues_from_records, diagnose, diagnose_loaded, IssueThresholds, IssueVerdict,
};
pub use output::KmcOutput;
pub use procstat::{parse_procstat, Direction, ProcessStatistics, StepOccurrences, PROCSTAT_OUTPUT_FILE};
pub use rates::{GasProduction, RateSummary};
pub use records::{LoadedRun, RunDirectory, RunRecords};
pub use scan::{read_scan, write_scan_csv, ScanOptions, ScanRow};
pub use stats::{average, WeightMode};
pub use structure::{LatticeMetadata, RunMetadata, SiteAssignment, SnapshotTable, SpeciesColumn};
pub use window::{select_window, AnalysisWindow, RangeType, SnapshotView, WindowBounds};
