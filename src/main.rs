//! Xbar - ReRAM Crosspoint Array Estimator
//!
//! Sweeps array geometries for a cell and process technology and reports the
//! best design.
//!
//! # Usage
//!
//! ```bash
//! xbar config.json --target performance --json > best.json
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use xbar_core::{config, explore, report, ExplorerConfig, OptimizationTarget, Result};

/// ReRAM crosspoint array estimator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON configuration (reference configuration if omitted)
    #[arg(value_name = "CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Figure of merit to optimize (overrides the configuration)
    #[arg(short, long, value_enum)]
    target: Option<OptimizationTarget>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log solver progress
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "xbar_core=debug" } else { "xbar_core=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config_file {
        Some(path) => config::load(path)?,
        None => ExplorerConfig::reference(),
    };
    let target = args.target.unwrap_or(config.target);

    let exploration = explore(&config, target)?;

    let mut out = io::stdout().lock();
    if args.json {
        report::write_json(&mut out, &exploration)
    } else {
        report::write_text(&mut out, &exploration)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
