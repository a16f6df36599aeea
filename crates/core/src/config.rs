use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_SEGMENT_CHARS: usize = 200;
pub const DEFAULT_OVERLAP_CHARS: usize = 30;
pub const DEFAULT_PAUSE_MS: u64 = 100;
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_CHARACTER_CONFIG: &str = "config/character_config.json";
pub const DEFAULT_PIPER_BINARY: &str = "piper";
pub const ENV_CHARACTER_CONFIG: &str = "SCRIPTVOICE_CONFIG";
pub const ENV_PIPER_BINARY: &str = "SCRIPTVOICE_PIPER_BIN";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration not found at {path}: {reason}")]
    NotFound { path: PathBuf, reason: String },
    #[error("malformed configuration: {0}")]
    Malformed(String),
    #[error("segment size must be > 0 characters")]
    ZeroSegmentChars,
    #[error("overlap ({overlap}) must be smaller than the segment size ({max})")]
    OverlapTooLarge { overlap: usize, max: usize },
    #[error("concurrency must be > 0")]
    ZeroConcurrency,
}

/// Character budget for a single synthesis call.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentBudget {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl SegmentBudget {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, ConfigError> {
        if max_chars == 0 {
            return Err(ConfigError::ZeroSegmentChars);
        }
        if overlap_chars >= max_chars {
            return Err(ConfigError::OverlapTooLarge {
                overlap: overlap_chars,
                max: max_chars,
            });
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }
}

impl Default for SegmentBudget {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_SEGMENT_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Concurrency(usize);

impl Concurrency {
    pub fn new(limit: usize) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(Self(limit))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self(DEFAULT_CONCURRENCY)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PauseDuration {
    pub millis: u64,
}

impl PauseDuration {
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }

    pub fn samples_for_sample_rate(&self, sample_rate_hz: u32) -> usize {
        let sr = u64::from(sample_rate_hz);
        let samples = self.millis.saturating_mul(sr).saturating_div(1000);
        usize::try_from(samples).unwrap_or(usize::MAX)
    }
}

impl Default for PauseDuration {
    fn default() -> Self {
        Self {
            millis: DEFAULT_PAUSE_MS,
        }
    }
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}

/// CLI flag, then environment, then the conventional default file if it
/// exists on disk.
pub fn resolve_character_config(
    cli_value: Option<PathBuf>,
    env: &impl Env,
    default_exists: impl Fn(&std::path::Path) -> bool,
) -> Option<PathBuf> {
    if let Some(path) = resolve_optional_string(
        cli_value.map(|p| p.to_string_lossy().into_owned()),
        ENV_CHARACTER_CONFIG,
        env,
    ) {
        return Some(PathBuf::from(path));
    }
    let fallback = PathBuf::from(DEFAULT_CHARACTER_CONFIG);
    default_exists(&fallback).then_some(fallback)
}
