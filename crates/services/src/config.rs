use std::time::Duration;

use lesson_core::model::ProgressionRules;
use lesson_core::session::DEFAULT_HEARTS;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for sessions, rewards and the recognition round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub starting_hearts: u32,
    pub xp_per_lesson: u64,
    pub progress_per_lesson: u32,
    pub judge_timeout_ms: u64,
    pub oracle_latency_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let rules = ProgressionRules::default();
        Self {
            starting_hearts: DEFAULT_HEARTS,
            xp_per_lesson: rules.xp_per_lesson,
            progress_per_lesson: rules.progress_per_lesson,
            judge_timeout_ms: 10_000,
            oracle_latency_ms: 0,
        }
    }
}

impl EngineConfig {
    /// Read overrides from `HANDLY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but unparsable, or the
    /// result fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, with an injectable variable source.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "HANDLY_STARTING_HEARTS")? {
            config.starting_hearts = v;
        }
        if let Some(v) = parse_var(&lookup, "HANDLY_XP_PER_LESSON")? {
            config.xp_per_lesson = v;
        }
        if let Some(v) = parse_var(&lookup, "HANDLY_PROGRESS_PER_LESSON")? {
            config.progress_per_lesson = v;
        }
        if let Some(v) = parse_var(&lookup, "HANDLY_JUDGE_TIMEOUT_MS")? {
            config.judge_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "HANDLY_ORACLE_LATENCY_MS")? {
            config.oracle_latency_ms = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` for malformed input, or a validation error.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::ZeroHearts` or `ConfigError::ZeroJudgeTimeout`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.starting_hearts == 0 {
            return Err(ConfigError::ZeroHearts);
        }
        if self.judge_timeout_ms == 0 {
            return Err(ConfigError::ZeroJudgeTimeout);
        }
        Ok(())
    }

    #[must_use]
    pub fn rules(&self) -> ProgressionRules {
        ProgressionRules {
            xp_per_lesson: self.xp_per_lesson,
            progress_per_lesson: self.progress_per_lesson,
        }
    }

    #[must_use]
    pub fn judge_timeout(&self) -> Duration {
        Duration::from_millis(self.judge_timeout_ms)
    }

    #[must_use]
    pub fn oracle_latency(&self) -> Duration {
        Duration::from_millis(self.oracle_latency_ms)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue { key, raw })
}
