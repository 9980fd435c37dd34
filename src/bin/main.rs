use clap::{Args, Parser, Subcommand};
use kmc_analysis_rs::{
    detect_issues_from_records, parse_procstat, read_scan, write_scan_csv, AnalysisWindow,
    Direction, IssueThresholds, KmcOutput, KmcResult, RangeType, RunDirectory, ScanOptions,
    WeightMode, PROCSTAT_OUTPUT_FILE,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command-line tool for reducing Zacros KMC simulation output
#[derive(Parser)]
#[command(name = "kmc-analysis")]
#[command(about = "Derive TOFs, coverages and steady-state diagnostics from Zacros runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Portion of the run to analyze
#[derive(Args, Clone, Copy)]
struct WindowArgs {
    /// Start of the analysis window, in percent
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// End of the analysis window, in percent
    #[arg(long, default_value_t = 100.0)]
    end: f64,

    /// What the percentages refer to: time or events
    #[arg(long, default_value = "time")]
    range_type: RangeType,
}

impl WindowArgs {
    fn window(&self) -> KmcResult<AnalysisWindow> {
        AnalysisWindow::new(self.start, self.end, self.range_type)
    }
}

#[derive(Args, Clone, Copy)]
struct ThresholdArgs {
    /// Largest acceptable |energy slope| (eV/Å²/step)
    #[arg(long, default_value_t = 5.0e-10)]
    energy_slope_threshold: f64,

    /// Smallest acceptable R² of time vs. events
    #[arg(long, default_value_t = 0.95)]
    r2_threshold: f64,

    /// Maximum number of samples used in the regressions
    #[arg(long, default_value_t = 100)]
    max_points: usize,
}

impl From<ThresholdArgs> for IssueThresholds {
    fn from(args: ThresholdArgs) -> Self {
        IssueThresholds {
            energy_slope_threshold: args.energy_slope_threshold,
            r2_threshold: args.r2_threshold,
            max_points: args.max_points,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the derived quantities of one run
    Summary {
        /// Directory holding the Zacros input and output files
        run_dir: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Weights for averages: none, time or nevents
        #[arg(long, default_value = "none")]
        weights: WeightMode,

        /// Print the full view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a run has reached steady state
    Issues {
        /// Directory holding the Zacros input and output files
        run_dir: PathBuf,

        /// Start of the analysis window, in percent of events
        #[arg(long, default_value_t = 0.0)]
        start: f64,

        /// End of the analysis window, in percent of events
        #[arg(long, default_value_t = 100.0)]
        end: f64,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Reduce every run below a scan directory
    Scan {
        /// Directory whose sub-directories are Zacros runs
        scan_dir: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Weights for averages: none, time or nevents
        #[arg(long, default_value = "none")]
        weights: WeightMode,

        /// Skip the steady-state checks
        #[arg(long)]
        no_issues: bool,

        #[command(flatten)]
        thresholds: ThresholdArgs,

        /// Output CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print event frequencies of the elementary steps
    Procstat {
        /// Directory holding procstat_output.txt and general_output.txt
        run_dir: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Occurrences to report: fwd, rev or net
        #[arg(long, default_value = "net")]
        direction: Direction,

        /// Output CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn fail(context: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}: {}", context, e);
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Summary {
            run_dir,
            window,
            weights,
            json,
        } => {
            let window = window.window().unwrap_or_else(|e| fail("Invalid window", e));
            let output = KmcOutput::new(&run_dir, window, weights)
                .unwrap_or_else(|e| fail("Error reading run", e));

            if json {
                match serde_json::to_string_pretty(&output) {
                    Ok(text) => println!("{}", text),
                    Err(e) => fail("Error serializing output", e),
                }
                return;
            }

            println!("Run: {:?}", run_dir);
            println!(
                "Window: [{}, {}] % of {} ({} rows), weights: {}",
                window.start_percent(),
                window.end_percent(),
                window.range_type(),
                output.bounds().len(),
                weights
            );
            println!("Temperature: {} K, pressure: {} bar", output.temperature(), output.pressure());
            println!("Final time: {} s", output.final_time());
            println!(
                "Energy: final {:.6e} eV/Å², average {:.6e} eV/Å², slope {:.3e} eV/Å²/step",
                output.final_energy(),
                output.av_energy(),
                output.energy_slope()
            );
            println!("TOF (molec·s⁻¹·Å⁻²):");
            for (gas, tof) in output.tof_map() {
                println!("  {:<12} {:.6e}", gas, tof);
            }
            println!("Average coverage (%):");
            for species in output.surf_specs_names() {
                if let Ok(cov) = output.average_coverage(species) {
                    println!("  {:<12} {:.4}", species, cov);
                }
            }
            for (site_type, site) in output.coverages().site_types() {
                println!(
                    "Site type {}: total {:.4} %, dominant {}",
                    site_type,
                    site.av_total_coverage,
                    site.dominant_ads.as_deref().unwrap_or("-")
                );
            }
        }

        Commands::Issues {
            run_dir,
            start,
            end,
            thresholds,
        } => {
            let window = AnalysisWindow::new(start, end, RangeType::Events)
                .unwrap_or_else(|e| fail("Invalid window", e));
            let thresholds = IssueThresholds::from(thresholds);
            match detect_issues_from_records(&RunDirectory::new(&run_dir), window, &thresholds) {
                Ok(verdict) => {
                    if verdict.has_issues {
                        println!("⚠️  {:?} has not reached steady state", run_dir);
                    } else {
                        println!("✅ {:?} looks steady", run_dir);
                    }
                    println!(
                        "  energy slope: {:.3e} eV/Å²/step (threshold {:.1e}){}",
                        verdict.energy_slope,
                        thresholds.energy_slope_threshold,
                        if verdict.energy_trend { " ← drifting" } else { "" }
                    );
                    println!(
                        "  time vs. events R²: {:.4} (threshold {}){}",
                        verdict.time_r_squared,
                        thresholds.r2_threshold,
                        if verdict.time_not_linear { " ← not linear" } else { "" }
                    );
                    println!("  points used: {}", verdict.points);
                }
                Err(e) => fail("Error checking run", e),
            }
        }

        Commands::Scan {
            scan_dir,
            window,
            weights,
            no_issues,
            thresholds,
            output,
        } => {
            let options = ScanOptions {
                window: window.window().unwrap_or_else(|e| fail("Invalid window", e)),
                weights,
                detect_issues: !no_issues,
                thresholds: thresholds.into(),
                show_progress: true,
            };
            println!("Reading scan: {:?}", scan_dir);
            let rows = read_scan(&scan_dir, &options).unwrap_or_else(|e| fail("Error reading scan", e));
            let failed = rows.iter().filter(|r| r.error.is_some()).count();
            println!("✅ Reduced {} runs ({} failed)", rows.len() - failed, failed);

            match output {
                Some(path) => match write_scan_csv(&rows, &path) {
                    Ok(()) => println!("📄 Results saved to: {:?}", path),
                    Err(e) => fail("Error writing CSV", e),
                },
                None => {
                    for row in &rows {
                        let issues = match row.has_issues {
                            Some(true) => "issues",
                            Some(false) => "ok",
                            None => "-",
                        };
                        println!(
                            "  {:<24} T={:<8} P={:<8} {}",
                            row.name,
                            row.temperature,
                            row.pressure,
                            row.error.as_deref().unwrap_or(issues)
                        );
                    }
                }
            }
        }

        Commands::Procstat {
            run_dir,
            window,
            direction,
            output,
        } => {
            let window = window.window().unwrap_or_else(|e| fail("Invalid window", e));
            let stats = parse_procstat(&run_dir.join(PROCSTAT_OUTPUT_FILE), &window)
                .unwrap_or_else(|e| fail("Error reading process statistics", e));
            println!(
                "Δt = {} s, area = {} Å², {} elementary steps",
                stats.delta_time(),
                stats.area(),
                stats.steps().len()
            );
            for step in stats.steps() {
                match stats.event_frequency(&step.step, direction) {
                    Ok(freq) => println!("  {:<32} {:.6e} s⁻¹·Å⁻² ({})", step.step, freq, direction),
                    Err(e) => fail("Error computing frequency", e),
                }
            }
            if let Some(path) = output {
                match stats.write_csv(&path) {
                    Ok(()) => println!("📄 Results saved to: {:?}", path),
                    Err(e) => fail("Error writing CSV", e),
                }
            }
        }
    }
}
