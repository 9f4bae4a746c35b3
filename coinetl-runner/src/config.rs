//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. The struct is built once and handed to each component.

use coinetl_core::data::http::DEFAULT_USER_AGENT;
use coinetl_core::data::{MarketSettings, RetryPolicy, DEFAULT_BASE_URL};
use coinetl_core::extract::ExtractSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub extract: ExtractConfig,
    pub paths: PathsConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub vs_currency: String,
    pub per_page: u32,
    pub page: u32,
    pub history_days: u32,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            vs_currency: "usd".to_string(),
            per_page: 50,
            page: 1,
            history_days: 60,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Backoff for rate-limited requests: wait `attempt × base_wait_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_wait_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_wait_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    pub top_n: usize,
    pub pause_between_coins_ms: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            pause_between_coins_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/coinetl.sqlite"),
        }
    }
}

impl EtlConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.extract.top_n == 0 {
            return invalid("extract.top_n must be at least 1".into());
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".into());
        }
        if (self.api.per_page as usize) < self.extract.top_n {
            return invalid(format!(
                "api.per_page ({}) is smaller than extract.top_n ({})",
                self.api.per_page, self.extract.top_n
            ));
        }
        if self.api.history_days == 0 {
            return invalid("api.history_days must be at least 1".into());
        }
        if self.api.vs_currency.trim().is_empty() {
            return invalid("api.vs_currency must not be empty".into());
        }
        Ok(())
    }

    pub fn market_settings(&self) -> MarketSettings {
        MarketSettings {
            base_url: self.api.base_url.clone(),
            vs_currency: self.api.vs_currency.clone(),
            per_page: self.api.per_page,
            page: self.api.page,
            history_days: self.api.history_days,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.base_wait_secs),
        )
    }

    pub fn extract_settings(&self) -> ExtractSettings {
        ExtractSettings {
            top_n: self.extract.top_n,
            pause_between_coins: Duration::from_millis(self.extract.pause_between_coins_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_documented_defaults() {
        let config = EtlConfig::from_toml("").unwrap();
        assert_eq!(config, EtlConfig::default());
        assert_eq!(config.api.base_url, "https://api.coingecko.com/api/v3");
        assert_eq!(config.retry_policy(), RetryPolicy::new(5, Duration::from_secs(5)));
        assert_eq!(config.extract_settings().top_n, 5);
        assert_eq!(config.store.path, PathBuf::from("data/coinetl.sqlite"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EtlConfig::from_toml(
            r#"
            [extract]
            top_n = 10

            [retry]
            base_wait_secs = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.extract.top_n, 10);
        assert_eq!(config.extract.pause_between_coins_ms, 1000);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_wait_secs, 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for toml in [
            "[extract]\ntop_n = 0",
            "[retry]\nmax_attempts = 0",
            "[api]\nper_page = 3\n[extract]\ntop_n = 5",
            "[api]\nhistory_days = 0",
            "[api]\nvs_currency = \" \"",
        ] {
            assert!(
                matches!(EtlConfig::from_toml(toml), Err(ConfigError::Invalid(_))),
                "accepted: {toml}"
            );
        }
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        assert!(matches!(
            EtlConfig::from_toml("[api]\nvs_curency = \"eur\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
