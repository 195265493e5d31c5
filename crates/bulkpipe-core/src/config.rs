use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{TokenGenerator, TokenSource};
use crate::control::Control;
use crate::error::PipelineError;
use crate::retry::{exponential_backoff, Classifier, RetryOptions, RetryPolicy};

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per write (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> Result<RetryPolicy, PipelineError> {
        let base = Duration::try_from_secs_f64(self.base_delay_secs).map_err(|e| {
            PipelineError::InvalidConfig(format!(
                "retry.base_delay_secs {}: {}",
                self.base_delay_secs, e
            ))
        })?;
        let max = Duration::from_secs(self.max_delay_secs);
        Ok(RetryPolicy::new(self.max_attempts)?.with_backoff(exponential_backoff(base, max)))
    }
}

/// Token cache bounds (optional section in config.toml).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenCacheConfig {
    /// Maximum cached tokens (None = unbounded).
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// Expire-after-write in seconds (None = never).
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl TokenCacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

/// Global configuration loaded from `~/.config/bulkpipe/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkpipeConfig {
    /// Items requested per paginated fetch.
    pub page_size: usize,
    /// Keys per atomic batch commit.
    pub write_batch_size: usize,
    /// Rows per insert request when splitting a large insert.
    pub insert_batch_size: usize,
    /// Optional bound on every store call, in seconds.
    #[serde(default)]
    pub call_timeout_secs: Option<f64>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional override of the transient error markers.
    #[serde(default)]
    pub transient_markers: Option<Vec<String>>,
    #[serde(default)]
    pub token_cache: Option<TokenCacheConfig>,
}

impl Default for BulkpipeConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            write_batch_size: 500,
            insert_batch_size: 500,
            call_timeout_secs: None,
            retry: None,
            transient_markers: None,
            token_cache: None,
        }
    }
}

impl BulkpipeConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [
            ("page_size", self.page_size),
            ("write_batch_size", self.write_batch_size),
            ("insert_batch_size", self.insert_batch_size),
        ] {
            if value == 0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        self.call_timeout()?;
        self.retry_policy()?;
        Ok(())
    }

    pub fn call_timeout(&self) -> Result<Option<Duration>, PipelineError> {
        self.call_timeout_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .ok()
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| {
                        PipelineError::InvalidConfig(format!(
                            "call_timeout_secs must be positive, got {}",
                            secs
                        ))
                    })
            })
            .transpose()
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, PipelineError> {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    pub fn classifier(&self) -> Classifier {
        match &self.transient_markers {
            Some(markers) => Classifier::with_transient_markers(markers),
            None => Classifier::default(),
        }
    }

    pub fn control(&self) -> Result<Control, PipelineError> {
        Ok(Control::new().with_call_timeout(self.call_timeout()?))
    }

    /// Token cache sized by the `[token_cache]` section.
    pub fn token_generator<S: TokenSource>(&self, source: S) -> TokenGenerator<S> {
        let cache = self.token_cache.clone().unwrap_or_default();
        TokenGenerator::new(source, cache.max_entries, cache.ttl())
    }

    pub fn retry_options(&self) -> Result<RetryOptions, PipelineError> {
        Ok(RetryOptions::default()
            .with_policy(self.retry_policy()?)
            .with_classifier(self.classifier()))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bulkpipe")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BulkpipeConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<BulkpipeConfig> {
    if !path.exists() {
        let default_cfg = BulkpipeConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: BulkpipeConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = BulkpipeConfig::default();
        assert_eq!(cfg.page_size, 1000);
        assert_eq!(cfg.write_batch_size, 500);
        assert_eq!(cfg.insert_batch_size, 500);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.retry_policy().unwrap().max_attempts(), 5);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = BulkpipeConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: BulkpipeConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_retry_and_extensions() {
        let toml = r#"
            page_size = 200
            write_batch_size = 50
            insert_batch_size = 100
            call_timeout_secs = 2.5
            transient_markers = ["Unavailable", "deadline"]

            [retry]
            max_attempts = 3
            base_delay_secs = 0.5
            max_delay_secs = 15

            [token_cache]
            max_entries = 64
            ttl_secs = 3000
        "#;
        let cfg: BulkpipeConfig = toml::from_str(toml).unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.page_size, 200);
        assert_eq!(
            cfg.call_timeout().unwrap(),
            Some(Duration::from_millis(2500))
        );
        let policy = cfg.retry_policy().unwrap();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff_for(0), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(10), Duration::from_secs(15));
        assert_eq!(cfg.classifier().transient_markers(), ["unavailable", "deadline"]);
        let cache = cfg.token_cache.unwrap();
        assert_eq!(cache.max_entries, Some(64));
        assert_eq!(cache.ttl(), Some(Duration::from_secs(3000)));
    }

    #[test]
    fn zero_sizes_and_attempts_rejected() {
        let cfg = BulkpipeConfig {
            write_batch_size: 0,
            ..BulkpipeConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = BulkpipeConfig {
            retry: Some(RetryConfig {
                max_attempts: 0,
                ..RetryConfig::default()
            }),
            ..BulkpipeConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = BulkpipeConfig {
            call_timeout_secs: Some(0.0),
            ..BulkpipeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_or_init_writes_defaults_then_reads_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let created = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        let loaded = load_or_init_at(&path).unwrap();
        assert_eq!(created, loaded);
    }

    #[test]
    fn invalid_file_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "page_size = 0\nwrite_batch_size = 1\ninsert_batch_size = 1\n",
        )
        .unwrap();
        assert!(load_or_init_at(&path).is_err());
    }
}
