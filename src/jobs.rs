//! Entry points used by the binaries
//!
//! Each job resolves credentials before touching the network, builds the
//! Polygon client and CSV store from the configuration, and runs one
//! orchestrator on a tokio runtime. Only startup failures are returned as
//! errors; per-instrument problems end up in the report.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use tracing::info;

use crate::backfill::{BackfillOrchestrator, BackfillReport};
use crate::common::RequestPacer;
use crate::config::{ApiCredentials, CollectorConfig, DEFAULT_CONFIG_FILE};
use crate::dates;
use crate::polygon::PolygonClient;
use crate::store::CsvSeriesStore;
use crate::sync::{SyncOrchestrator, SyncReport};

/// Load the configuration.
///
/// An explicit path must exist. Without one, `collector.json` in the working
/// directory is used when present, otherwise the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<CollectorConfig> {
    let config = match path {
        Some(path) => CollectorConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            CollectorConfig::from_file(DEFAULT_CONFIG_FILE)
                .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_FILE))?
        }
        None => CollectorConfig::default(),
    };

    config.validate()?;
    Ok(config)
}

fn build_client(config: &CollectorConfig) -> Result<PolygonClient> {
    let credentials = ApiCredentials::load(&config.api_keys_path)
        .context("Failed to load Polygon API key")?;

    let client = PolygonClient::with_timeout(credentials.api_key(), config.timeout())
        .context("Failed to build HTTP client")?
        .with_base_url(&config.base_url);
    Ok(client)
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

/// Run a full backfill with today as the reference date
pub fn run_backfill(config: &CollectorConfig) -> Result<BackfillReport> {
    run_backfill_at(config, dates::today())
}

pub fn run_backfill_at(config: &CollectorConfig, reference_date: NaiveDate) -> Result<BackfillReport> {
    let client = build_client(config)?;
    let runtime = build_runtime()?;

    info!(
        "Starting backfill of {} instruments into {}",
        config.instruments.len(),
        config.data_dir
    );

    let orchestrator = BackfillOrchestrator::new(
        client,
        CsvSeriesStore::new(&config.data_dir),
        config.instruments.clone(),
    )
    .with_lookback_days(config.lookback_days)
    .with_pacer(RequestPacer::new(config.request_interval()))
    .with_retry(config.retry_policy());

    Ok(runtime.block_on(orchestrator.run(reference_date)))
}

/// Run an incremental sync with today as the reference date
pub fn run_sync(config: &CollectorConfig) -> Result<SyncReport> {
    run_sync_at(config, dates::today())
}

pub fn run_sync_at(config: &CollectorConfig, reference_date: NaiveDate) -> Result<SyncReport> {
    let client = build_client(config)?;
    let runtime = build_runtime()?;

    info!(
        "Starting sync of {} instruments in {}",
        config.instruments.len(),
        config.data_dir
    );

    let orchestrator = SyncOrchestrator::new(
        client,
        CsvSeriesStore::new(&config.data_dir),
        config.instruments.clone(),
    )
    .with_pacer(RequestPacer::new(config.request_interval()))
    .with_retry(config.retry_policy());

    Ok(runtime.block_on(orchestrator.run(reference_date)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.json"))).is_err());
    }

    #[test]
    fn test_explicit_config_is_validated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("collector.json");
        std::fs::write(&path, r#"{"instruments": []}"#).unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
