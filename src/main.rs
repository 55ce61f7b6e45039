//! Daily aggregates collector - main entry point
//!
//! This binary provides two subcommands:
//! - backfill: Rebuild every series from a two-year window
//! - sync: Append the days missing since the last run

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use daily_agg_collector::{jobs, logging};

#[derive(Parser, Debug)]
#[command(name = "daily-agg-collector")]
#[command(about = "Collect daily OHLCV aggregates for crypto pairs from Polygon.io", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to JSON configuration file (defaults to collector.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch two years of history and overwrite every series file
    Backfill {
        #[command(flatten)]
        paths: PathArgs,
    },

    /// Fetch only the days missing since each series' latest bar
    Sync {
        #[command(flatten)]
        paths: PathArgs,
    },
}

#[derive(clap::Args, Debug)]
struct PathArgs {
    /// Directory holding the series CSV files
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Key file containing POLYGON_API_KEY
    #[arg(long)]
    api_keys: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (command_name, paths) = match &cli.command {
        Commands::Backfill { paths } => ("backfill", paths),
        Commands::Sync { paths } => ("sync", paths),
    };

    logging::setup_logging(cli.verbose, command_name)?;

    let mut config = jobs::load_config(cli.config.as_deref())?;
    if let Some(data_dir) = &paths.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(api_keys) = &paths.api_keys {
        config.api_keys_path = api_keys.clone();
    }

    match cli.command {
        Commands::Backfill { .. } => {
            let report = jobs::run_backfill(&config)?;
            println!("\n{}", report);
        }
        Commands::Sync { .. } => {
            let report = jobs::run_sync(&config)?;
            println!("\n{}", report);
        }
    }

    Ok(())
}
