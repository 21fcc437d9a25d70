//! Configuration management for Turnstile.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then `TURNSTILE__`-prefixed environment variables (`__` separates nested
//! keys, e.g. `TURNSTILE__RATE_LIMIT__JITTER_RATIO=0.1`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::error::{Result, TurnstileError};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for Turnstile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Prefix for every bucket key built by [`KeyBuilder`](crate::ratelimit::KeyBuilder)
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Jitter ratio applied to presets that don't set their own
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,

    /// Preset name to preset definition
    #[serde(default = "default_presets")]
    pub presets: BTreeMap<String, PresetConfig>,

    /// Seconds between idle-bucket sweeps (0 disables the sweep)
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            jitter_ratio: default_jitter_ratio(),
            presets: default_presets(),
            eviction_interval_secs: default_eviction_interval(),
        }
    }
}

/// A single preset as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetConfig {
    /// Maximum number of tokens the bucket holds
    pub capacity: u32,

    /// Tokens added per refill interval
    #[serde(alias = "refillTokens")]
    pub refill_tokens: u32,

    /// Refill interval in seconds
    #[serde(alias = "refillInterval")]
    pub refill_interval: u64,

    /// Per-preset override of the global jitter ratio
    #[serde(default, alias = "jitterRatio")]
    pub jitter_ratio: Option<f64>,
}

impl PresetConfig {
    pub fn new(capacity: u32, refill_tokens: u32, refill_interval: u64) -> Self {
        Self {
            capacity,
            refill_tokens,
            refill_interval,
            jitter_ratio: None,
        }
    }
}

fn default_namespace() -> String {
    "rate".to_string()
}

fn default_jitter_ratio() -> f64 {
    0.2
}

fn default_presets() -> BTreeMap<String, PresetConfig> {
    BTreeMap::from([
        ("default".to_string(), PresetConfig::new(60, 60, 60)),
        ("strict".to_string(), PresetConfig::new(10, 10, 10)),
        ("bursty".to_string(), PresetConfig::new(120, 60, 60)),
    ])
}

fn default_eviction_interval() -> u64 {
    60
}

/// Scalar settings that can be overridden from the environment.
///
/// Environment keys are case-folded, so presets (whose names and camelCase
/// aliases are case-sensitive) only come from the file.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    #[serde(default)]
    logging: LoggingOverrides,
    #[serde(default)]
    rate_limit: RateLimitOverrides,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingOverrides {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct RateLimitOverrides {
    namespace: Option<String>,
    jitter_ratio: Option<f64>,
    eviction_interval_secs: Option<u64>,
}

impl EnvOverrides {
    fn from_env(prefix: &str) -> Result<Self> {
        let overrides = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(overrides)
    }

    fn apply(self, config: &mut TurnstileConfig) {
        if let Some(level) = self.logging.level {
            config.logging.level = level;
        }
        if let Some(format) = self.logging.format {
            config.logging.format = format;
        }
        if let Some(namespace) = self.rate_limit.namespace {
            config.rate_limit.namespace = namespace;
        }
        if let Some(jitter_ratio) = self.rate_limit.jitter_ratio {
            config.rate_limit.jitter_ratio = jitter_ratio;
        }
        if let Some(secs) = self.rate_limit.eviction_interval_secs {
            config.rate_limit.eviction_interval_secs = secs;
        }
    }
}

impl TurnstileConfig {
    /// Load configuration from an optional YAML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    /// [`load`](Self::load) with a custom environment prefix.
    pub fn load_with_env_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                if !path.exists() {
                    return Err(TurnstileError::Config(format!(
                        "configuration file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        EnvOverrides::from_env(prefix)?.apply(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, without environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TurnstileConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that don't need the preset registry.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.namespace.is_empty() {
            return Err(TurnstileError::Config(
                "rate_limit.namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
