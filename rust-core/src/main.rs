//! `wake-tuner` binary: decode wake logs and replay them through the firmware filters.
//!
//! # Usage
//!
//! ```bash
//! wake-tuner logs/day1.bin logs/day2.bin
//! wake-tuner --config tune.json --lda-trial --solve logs/*.bin
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wake_tuner::sample_set::distance_from_mean;
use wake_tuner::{
    firmware, AnalysisConfig, Filter, Predicate, SampleSet, SpectralWeightSolver,
};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "wake-tuner",
    version,
    about = "Decode wake gesture logs and evaluate gesture filters",
    long_about = None
)]
struct Args {
    /// Binary wake logs to decode, in order.
    #[arg(required = true, value_name = "LOG")]
    logs: Vec<PathBuf>,

    /// JSON analysis configuration. Defaults are used when absent.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the resync skip budget.
    #[arg(long)]
    max_skip: Option<usize>,

    /// Insert the fixed-weight filter after the tilt check.
    #[arg(long, default_value_t = false)]
    lda_trial: bool,

    /// Solve LDA axes separating confirmed from unconfirmed full bursts.
    #[arg(long, default_value_t = false)]
    solve: bool,

    /// Write the decoded samples as JSON.
    #[arg(long, value_name = "FILE")]
    dump_json: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let env = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(env.as_deref(), &args.log_level))
        .with_target(false)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Directives from `RUST_LOG` if it parses, else the `--log-level` value, else info.
fn log_filter(env: Option<&str>, level: &str) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn run(args: Args) -> wake_tuner::Result<()> {
    let mut config = match args.config.as_deref() {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            AnalysisConfig::from_json_file(path)?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(max_skip) = args.max_skip {
        config.decoder.max_skip = max_skip;
    }
    config.validate()?;

    let mut set = SampleSet::new();
    let mut next_id = 0;
    for path in &args.logs {
        let (decoded, summary) = SampleSet::from_file(path, &config.decoder, next_id)?;
        next_id = summary.next_id;
        info!(
            "{}: {} wake, {} battery, {} diagnostics",
            path.display(),
            summary.wake_count,
            summary.battery_count,
            summary.diagnostics.len()
        );
        if let Some(reason) = &summary.termination {
            warn!("{}: stopped early: {reason}", path.display());
        }
        set.combine(decoded);
    }

    if config.outliers_to_remove > 0 {
        let removed = set.remove_outliers(config.outliers_to_remove, distance_from_mean);
        info!("Removed {} outliers", removed.len());
    }

    let s = set.summary();
    println!(
        "samples: {} ({} confirmed, {} unconfirmed), {} full, {} partial",
        s.total, s.confirmed, s.unconfirmed, s.full, s.partial
    );
    println!(
        "triggers: {} y, {} z, {} super-y; {} double-click; {} battery records; {} ms awake",
        s.trigger_y, s.trigger_z, s.super_y, s.double_click, s.battery_samples, s.total_wake_time_ms
    );

    if let Some(path) = &args.dump_json {
        std::fs::write(path, serde_json::to_string(&set)?)?;
        info!("Wrote samples to {}", path.display());
    }

    let cascade = if args.lda_trial {
        firmware::firmware_cascade_with_lda()?
    } else {
        firmware::firmware_cascade()?
    };
    let mut cascade = cascade.with_input(set.clone());
    println!("{}", cascade.run()?);

    if args.solve {
        let confirmed = set.feature_matrix(&Filter::all([
            Predicate::Full(true),
            Predicate::Confirmed(true),
        ]));
        let unconfirmed = set.feature_matrix(&Filter::all([
            Predicate::Full(true),
            Predicate::Confirmed(false),
        ]));
        let solver = SpectralWeightSolver::new(config.solver.clone());
        let axes = solver.lda(&[&confirmed, &unconfirmed])?;
        println!("lda eigenvalues (top 4):");
        for (i, v) in axes.eigenvalues.iter().take(4).enumerate() {
            println!("  [{i}] {v:.6e}");
        }
    }

    Ok(())
}
