//! Logging setup shared by the binaries
//!
//! Each job run gets its own file, `logs/{job}_{timestamp}.log`, so a daily
//! sync can be audited after the fact. The console shows the same events
//! without targets.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_DIR: &str = "logs";

/// Default filter for a job. `--verbose` only raises this crate to debug,
/// which surfaces request URLs (key redacted) and per-file row counts.
fn default_filter(verbose: bool) -> String {
    let collector_level = if verbose { "debug" } else { "info" };
    format!(
        "info,daily_agg_collector={},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        collector_level
    )
}

/// Install console and file logging for `job` ("backfill" or "sync").
///
/// `RUST_LOG` replaces the default filter when set.
pub fn setup_logging(verbose: bool, job: &str) -> Result<()> {
    std::fs::create_dir_all(LOG_DIR).context("Failed to create logs directory")?;

    let log_filename = format!(
        "{}_{}.log",
        job,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from(LOG_DIR).join(&log_filename);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::never(LOG_DIR, &log_filename))
        .with_target(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    info!(
        "daily-agg-collector {} starting {} (log file: {})",
        env!("CARGO_PKG_VERSION"),
        job,
        log_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_only_raises_collector_level() {
        let quiet = default_filter(false);
        let verbose = default_filter(true);
        assert!(quiet.starts_with("info,daily_agg_collector=info,"));
        assert!(verbose.starts_with("info,daily_agg_collector=debug,"));
        assert!(verbose.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(verbose).is_ok());
    }
}
