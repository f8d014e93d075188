use anyhow::{bail, Result};
use clap::Parser;
use simulation::{SimConfig, Simulation};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run seeded trading bots against the exchange and audit the result
#[derive(Debug, Parser)]
#[command(name = "exchange-sim", version)]
struct Cli {
    /// TOML config; defaults apply to missing keys
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Override the configured seed
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SimConfig::load_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let report = Simulation::new(config)?.run()?;
    match &cli.out {
        Some(path) => {
            report.write_to_file(path)?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{}", report.to_json()?),
    }

    if !report.audit.is_clean() {
        bail!(
            "audit found {} violation(s): {}",
            report.audit.violations.len(),
            report.audit.violations.join("; ")
        );
    }
    Ok(())
}
