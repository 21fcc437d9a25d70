//! Rate limit presets and the registry that resolves them.
//!
//! Presets are parsed from configuration once, validated, and then only read.
//! Callers refer to them by [`PresetId`]; the built-in names get their own
//! variants so the common cases never go through string matching at request
//! time.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::{PresetConfig, RateLimitSettings};
use crate::error::{Result, TurnstileError};

/// Identifier of a preset in the registry.
///
/// Identity is the preset name: `Named("strict")` and `Strict` are the same id.
#[derive(Debug, Clone)]
pub enum PresetId {
    Default,
    Strict,
    Bursty,
    /// Any other configured preset
    Named(String),
}

impl PresetId {
    pub fn as_str(&self) -> &str {
        match self {
            PresetId::Default => "default",
            PresetId::Strict => "strict",
            PresetId::Bursty => "bursty",
            PresetId::Named(name) => name,
        }
    }
}

impl PartialEq for PresetId {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for PresetId {}

impl Hash for PresetId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for PresetId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PresetId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl From<&str> for PresetId {
    fn from(name: &str) -> Self {
        match name {
            "default" => PresetId::Default,
            "strict" => PresetId::Strict,
            "bursty" => PresetId::Bursty,
            other => PresetId::Named(other.to_string()),
        }
    }
}

impl FromStr for PresetId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(PresetId::from(s))
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PresetId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Immutable token-bucket parameters. Only [`Preset::new`] builds one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preset {
    /// Maximum number of tokens
    pub(crate) capacity: u32,
    /// Tokens added per whole refill interval
    pub(crate) refill_tokens: u32,
    /// Length of one refill interval in seconds
    pub(crate) refill_interval_secs: u64,
    /// Refill amounts vary uniformly within `±jitter_ratio`
    pub(crate) jitter_ratio: f64,
}

impl Preset {
    /// Build a preset, rejecting values the bucket math can't work with.
    pub fn new(
        capacity: u32,
        refill_tokens: u32,
        refill_interval_secs: u64,
        jitter_ratio: f64,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(TurnstileError::Config("capacity must be greater than 0".to_string()));
        }
        if refill_tokens == 0 {
            return Err(TurnstileError::Config(
                "refill_tokens must be greater than 0".to_string(),
            ));
        }
        if refill_interval_secs == 0 {
            return Err(TurnstileError::Config(
                "refill_interval must be greater than 0".to_string(),
            ));
        }
        if !jitter_ratio.is_finite() || !(0.0..1.0).contains(&jitter_ratio) {
            return Err(TurnstileError::Config(format!(
                "jitter_ratio must be in [0, 1), got {}",
                jitter_ratio
            )));
        }

        Ok(Self {
            capacity,
            refill_tokens,
            refill_interval_secs,
            jitter_ratio,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_tokens(&self) -> u32 {
        self.refill_tokens
    }

    pub fn refill_interval_secs(&self) -> u64 {
        self.refill_interval_secs
    }

    pub fn jitter_ratio(&self) -> f64 {
        self.jitter_ratio
    }

    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(self.refill_interval_secs)
    }

    fn from_config(config: &PresetConfig, global_jitter: f64) -> Result<Self> {
        Self::new(
            config.capacity,
            config.refill_tokens,
            config.refill_interval,
            config.jitter_ratio.unwrap_or(global_jitter),
        )
    }
}

/// Read-only map from preset id to preset.
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: HashMap<PresetId, Preset>,
}

impl PresetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a preset while building the registry.
    pub fn with_preset(mut self, id: impl Into<PresetId>, preset: Preset) -> Self {
        self.presets.insert(id.into(), preset);
        self
    }

    /// Build and validate the registry from rate limit settings.
    pub fn from_settings(settings: &RateLimitSettings) -> Result<Self> {
        let mut presets = HashMap::with_capacity(settings.presets.len());

        for (name, config) in &settings.presets {
            let preset = Preset::from_config(config, settings.jitter_ratio).map_err(|e| {
                TurnstileError::Config(format!("preset '{}': {}", name, e))
            })?;
            presets.insert(PresetId::from(name.as_str()), preset);
        }

        info!(presets = presets.len(), "Preset registry loaded");
        Ok(Self { presets })
    }

    /// Look up a preset, failing with `UnknownPreset` if it isn't registered.
    pub fn get(&self, id: &PresetId) -> Result<&Preset> {
        self.presets.get(id).ok_or_else(|| TurnstileError::UnknownPreset {
            name: id.to_string(),
        })
    }

    /// Resolve a preset name to its id, failing if it isn't registered.
    pub fn resolve(&self, name: &str) -> Result<PresetId> {
        let id = PresetId::from(name);
        self.get(&id)?;
        Ok(id)
    }

    pub fn contains(&self, id: &PresetId) -> bool {
        self.presets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Presets ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = (&PresetId, &Preset)> {
        let mut entries: Vec<_> = self.presets.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }
}
