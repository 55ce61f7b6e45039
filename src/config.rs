//! Configuration management
//!
//! Handles the optional JSON configuration file and loading the Polygon API
//! key from `api_keys.txt` (or the environment).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::RetryPolicy;
use crate::dates::BACKFILL_LOOKBACK_DAYS;
use crate::error::ConfigError;
use crate::polygon::POLYGON_API_BASE;
use crate::types::{default_instruments, Instrument};

/// Configuration file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "collector.json";

/// Name of the API key entry in the key file and the environment
pub const API_KEY_NAME: &str = "POLYGON_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Tracked instruments, processed in this order
    pub instruments: Vec<Instrument>,
    /// Directory holding the series files
    pub data_dir: String,
    /// Key-value text file containing `POLYGON_API_KEY = <key>`
    pub api_keys_path: String,
    pub lookback_days: u32,
    /// Minimum seconds between two API calls
    pub request_interval_secs: u64,
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            instruments: default_instruments(),
            data_dir: ".".to_string(),
            api_keys_path: "api_keys.txt".to_string(),
            lookback_days: BACKFILL_LOOKBACK_DAYS,
            request_interval_secs: 12,
            base_url: POLYGON_API_BASE.to_string(),
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CollectorConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::Invalid("no instruments configured".to_string()));
        }
        if self.lookback_days == 0 {
            return Err(ConfigError::Invalid(
                "lookback_days must be greater than zero".to_string(),
            ));
        }

        let mut tickers = HashSet::new();
        let mut files = HashSet::new();
        for instrument in &self.instruments {
            if instrument.ticker.trim().is_empty() || instrument.series_name().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "invalid instrument ticker '{}'",
                    instrument.ticker
                )));
            }
            if !tickers.insert(instrument.ticker.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate instrument {}",
                    instrument.ticker
                )));
            }
            if !files.insert(instrument.file_name()) {
                return Err(ConfigError::Invalid(format!(
                    "{} maps to an already used series file {}",
                    instrument.ticker,
                    instrument.file_name()
                )));
            }
        }
        Ok(())
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.request_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }
}

/// Retry settings as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts after a retryable failure. 0 disables retries.
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Growth factor per attempt; 1.0 or less means a fixed delay
    pub backoff_factor: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 0,
            backoff_ms: 1_000,
            backoff_factor: 1.0,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.backoff_ms);
        if self.backoff_factor > 1.0 {
            RetryPolicy::exponential(
                base,
                self.backoff_factor,
                Duration::from_millis(self.max_backoff_ms),
                self.max_retries,
            )
        } else {
            RetryPolicy::fixed(base, self.max_retries)
        }
    }
}

// =============================================================================
// API credentials
// =============================================================================

/// Polygon API key
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ApiCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        ApiCredentials {
            api_key: api_key.into(),
        }
    }

    /// Resolve the API key.
    ///
    /// A non-empty `POLYGON_API_KEY` in the environment (or `.env`) wins,
    /// otherwise the key file at `path` is read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        if let Ok(api_key) = std::env::var(API_KEY_NAME) {
            if !api_key.trim().is_empty() {
                return Ok(Self::new(api_key.trim()));
            }
        }

        Self::from_file(path)
    }

    /// Read the key from a key-value text file. The first valid line wins.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents).ok_or_else(|| ConfigError::MissingApiKey {
            path: PathBuf::from(path),
        })
    }

    /// Find the first `POLYGON_API_KEY = <key>` line with a non-empty key
    pub fn parse(contents: &str) -> Option<Self> {
        contents.lines().find_map(|line| {
            let (name, value) = line.trim().split_once('=')?;
            let value = value.trim();
            (name.trim() == API_KEY_NAME && !value.is_empty()).then(|| Self::new(value))
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Backoff;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.instruments.len(), 5);
        assert_eq!(config.lookback_days, 730);
        assert_eq!(config.request_interval(), Duration::from_secs(12));
        assert_eq!(config.retry_policy(), RetryPolicy::no_retry());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("collector.json");
        fs::write(
            &path,
            r#"{
                "instruments": [{"ticker": "X:LTCUSD", "name": "Litecoin"}],
                "data_dir": "data",
                "retry": {"max_retries": 2, "backoff_factor": 2.0}
            }"#,
        )
        .unwrap();

        let config = CollectorConfig::from_file(&path).unwrap();
        assert_eq!(config.instruments, vec![Instrument::new("X:LTCUSD", "Litecoin")]);
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.lookback_days, 730);
        assert_eq!(config.retry_policy().max_retries, 2);
        assert!(matches!(
            config.retry_policy().backoff,
            Backoff::Exponential { .. }
        ));
    }

    #[test]
    fn test_duplicate_series_files_are_rejected() {
        let config = CollectorConfig {
            instruments: vec![
                Instrument::new("X:BTCUSD", ""),
                Instrument::new("BTC-USD", ""),
            ],
            ..CollectorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_instrument_list_is_rejected() {
        let config = CollectorConfig {
            instruments: Vec::new(),
            ..CollectorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_api_key_first_valid_line_wins() {
        let contents = "# keys\nOTHER_KEY = abc\nPOLYGON_API_KEY =\n  POLYGON_API_KEY = first \nPOLYGON_API_KEY = second\n";
        let credentials = ApiCredentials::parse(contents).unwrap();
        assert_eq!(credentials.api_key(), "first");
    }

    #[test]
    fn test_parse_api_key_keeps_equals_in_value() {
        let credentials = ApiCredentials::parse("POLYGON_API_KEY=ab=cd").unwrap();
        assert_eq!(credentials.api_key(), "ab=cd");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api_keys.txt");
        fs::write(&path, "ALPACA_API_KEY = xyz\n").unwrap();

        assert!(matches!(
            ApiCredentials::from_file(&path),
            Err(ConfigError::MissingApiKey { .. })
        ));
        assert!(matches!(
            ApiCredentials::from_file(dir.path().join("absent.txt")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_environment_key_overrides_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("api_keys.txt");
        fs::write(&path, "POLYGON_API_KEY = from-file\n").unwrap();

        // Only this test touches the variable; a blank value is never replaced by .env
        std::env::set_var(API_KEY_NAME, "  from-env  ");
        let from_env = ApiCredentials::load(&path).map(|c| c.api_key().to_string());
        let from_env_no_file =
            ApiCredentials::load(dir.path().join("absent.txt")).map(|c| c.api_key().to_string());

        std::env::set_var(API_KEY_NAME, "   ");
        let blank_env = ApiCredentials::load(&path).map(|c| c.api_key().to_string());
        std::env::remove_var(API_KEY_NAME);

        assert_eq!(from_env.unwrap(), "from-env");
        assert_eq!(from_env_no_file.unwrap(), "from-env");
        assert_eq!(blank_env.unwrap(), "from-file");
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = ApiCredentials::new("abc123");
        assert!(!format!("{:?}", credentials).contains("abc123"));
    }
}
