use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use memorider::{ConfiguredProvider, Registry, UnitsConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memorider")]
#[command(about = "Inspect and health-check persistence unit definitions")]
struct Cli {
    /// JSON file with unit definitions (defaults to $MEMORIDER_UNITS)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the configured units
    List,
    /// Initialize units and report their status
    Check {
        /// Units to check; all configured units when empty
        units: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let units = load_units(cli.config.as_deref())?;

    match cli.command {
        Command::List => list(&units),
        Command::Check { units: names } => check(units, names),
    }
}

fn load_units(path: Option<&std::path::Path>) -> Result<UnitsConfig> {
    match path {
        Some(path) => UnitsConfig::from_file(path)
            .with_context(|| format!("failed to load units from {}", path.display())),
        None => UnitsConfig::from_env()
            .context("failed to load units from MEMORIDER_UNITS")?
            .context("no --config given and MEMORIDER_UNITS is not set"),
    }
}

fn list(units: &UnitsConfig) -> Result<()> {
    for unit in &units.units {
        println!("{:<24} {}", unit.name, unit.to_url());
    }
    Ok(())
}

fn check(units: UnitsConfig, names: Vec<String>) -> Result<()> {
    let names = if names.is_empty() {
        units.names().into_iter().map(str::to_string).collect()
    } else {
        names
    };

    let registry = Registry::new(ConfiguredProvider::new(units));
    let mut failed = 0usize;

    for name in &names {
        let bundle = registry.instance(name);
        match bundle.status() {
            Some(status) if status.is_ready() => {
                let strategy = bundle
                    .strategy()
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                println!("{:<24} {} ({} unwrap)", name, status, strategy);
            }
            Some(status) => {
                failed += 1;
                println!("{:<24} {}", name, status);
            }
            None => {
                failed += 1;
                println!("{:<24} not initialized", name);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} units failed to initialize", failed, names.len());
    }
    Ok(())
}
