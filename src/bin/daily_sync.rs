//! Incremental sync binary
//!
//! Appends the days missing since each series' latest bar. Meant to run once
//! a day from a scheduler; takes no flags.

use anyhow::Result;
use daily_agg_collector::{jobs, logging};

fn main() -> Result<()> {
    logging::setup_logging(false, "sync")?;

    let config = jobs::load_config(None)?;
    let report = jobs::run_sync(&config)?;

    println!("\n{}", report);
    Ok(())
}
