use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use pkmodel::config::{validate, with_defaults, Configuration};
use pkmodel::models::CompartmentModel;
use pkmodel::output;
use pkmodel::simulation::{Simulator, SolverOptions, DEFAULT_RESOLUTION};

#[derive(Parser)]
#[command(name = "pkmodel")]
#[command(about = "Multi-compartment pharmacokinetic model simulation")]
struct Cli {
    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Minimum number of evaluation points
    #[arg(short, long, default_value_t = DEFAULT_RESOLUTION)]
    resolution: usize,

    /// Abort integration after this many seconds
    #[arg(short, long)]
    timeout_secs: Option<f64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let input = Configuration::from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
    info!("Loaded configuration from {:?}", cli.config);

    let config = with_defaults(input.into_value());
    let validated = validate(&config).context("configuration rejected")?;
    let model = CompartmentModel::from_config(validated)?;

    let options = SolverOptions {
        resolution: cli.resolution,
        timeout: cli.timeout_secs.map(Duration::from_secs_f64),
        ..SolverOptions::default()
    };
    let solution = Simulator::new(options).solve(&model)?;
    let stats = solution.stats();
    info!(
        "Integration used {} evaluations ({} accepted, {} rejected steps)",
        stats.evaluations, stats.accepted_steps, stats.rejected_steps
    );

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create output directory {:?}", cli.output))?;
    let written = output::save_solution(&solution, &cli.output)?;
    for path in written {
        info!("Wrote {:?}", path);
    }

    Ok(())
}
