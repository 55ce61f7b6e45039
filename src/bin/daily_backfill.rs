//! Full backfill binary
//!
//! Rebuilds every tracked series from two years of daily aggregates. Takes no
//! flags; reads `collector.json` from the working directory when present.

use anyhow::Result;
use daily_agg_collector::{jobs, logging};

fn main() -> Result<()> {
    logging::setup_logging(false, "backfill")?;

    let config = jobs::load_config(None)?;
    let report = jobs::run_backfill(&config)?;

    println!("\n{}", report);
    Ok(())
}
