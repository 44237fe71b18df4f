//! Engine configuration.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefix of the environment variables read by [`EngineConfig::from_env`].
pub const ENV_PREFIX: &str = "DAGFLOW_";

/// Tunables of an [`Engine`](crate::runtime::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads per run; `0` uses the number of available CPUs.
    pub parallelism: usize,
    /// Capacity of the worker pool's first tier.
    pub pool_cache_size: usize,
    /// Workers built ahead of the first run.
    pub warmup: usize,
    /// Build a fresh worker for every run.
    pub disable_pool: bool,
    /// Record a trace of every run.
    pub enable_tracking: bool,
    /// Runs slower than this are logged as warnings; `0` disables the check.
    pub slow_threshold_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 0,
            pool_cache_size: 8,
            warmup: 0,
            disable_pool: false,
            enable_tracking: false,
            slow_threshold_ms: 0,
        }
    }
}

impl EngineConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.warmup > self.pool_cache_size && !self.disable_pool {
            return Err(format!(
                "warmup ({}) must not exceed pool_cache_size ({})",
                self.warmup, self.pool_cache_size
            ));
        }
        if self.disable_pool && self.warmup > 0 {
            return Err("warmup requires the worker pool".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message if the input does not parse or fails validation.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `DAGFLOW_*` environment variables, loading a
    /// `.env` file first if one exists.
    ///
    /// # Errors
    ///
    /// Returns a message if a variable does not parse or validation fails.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from `lookup`, which maps full variable names
    /// (such as `DAGFLOW_PARALLELISM`) to values. Unset keys keep defaults.
    ///
    /// # Errors
    ///
    /// Returns a message if a value does not parse or validation fails.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(&format!("{ENV_PREFIX}{key}"))
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let mut cfg = Self::default();
        if let Some(v) = read("PARALLELISM") {
            cfg.parallelism = parse("PARALLELISM", &v)?;
        }
        if let Some(v) = read("POOL_CACHE_SIZE") {
            cfg.pool_cache_size = parse("POOL_CACHE_SIZE", &v)?;
        }
        if let Some(v) = read("WARMUP") {
            cfg.warmup = parse("WARMUP", &v)?;
        }
        if let Some(v) = read("DISABLE_POOL") {
            cfg.disable_pool = parse_flag("DISABLE_POOL", &v)?;
        }
        if let Some(v) = read("ENABLE_TRACKING") {
            cfg.enable_tracking = parse_flag("ENABLE_TRACKING", &v)?;
        }
        if let Some(v) = read("SLOW_THRESHOLD_MS") {
            cfg.slow_threshold_ms = parse("SLOW_THRESHOLD_MS", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Slow-run threshold, if enabled.
    #[must_use]
    pub const fn slow_threshold(&self) -> Option<Duration> {
        if self.slow_threshold_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.slow_threshold_ms))
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{ENV_PREFIX}{key}: invalid value `{value}`"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{ENV_PREFIX}{key}: invalid flag `{value}`")),
    }
}
