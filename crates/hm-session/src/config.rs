//! Session configuration.

use serde::{Deserialize, Serialize};

use hm_surrogate::SurrogateConfig;
use hm_types::{ConfigError, HmResult, ObjectiveDirection, TaskConfig};

pub const ENV_DEBUG: &str = "HYPERMINT_DEBUG";
pub const ENV_SEED: &str = "HYPERMINT_SEED";
pub const ENV_NOISELESS: &str = "HYPERMINT_NOISELESS";
pub const ENV_DIRECTION: &str = "HYPERMINT_DIRECTION";

/// Top-level configuration for an optimizer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether the objective is deterministic.
    pub noiseless: bool,

    /// Direction of optimization.
    pub direction: ObjectiveDirection,

    /// Let surrogate diagnostics through during `suggest`.
    pub debug: bool,

    /// Seed for the session's own sampler; the surrogate derives its seed
    /// from it unless [`SurrogateConfig::seed`] is set.
    pub seed: Option<u64>,

    pub surrogate: SurrogateConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            noiseless: false,
            direction: ObjectiveDirection::Minimize,
            debug: false,
            seed: None,
            surrogate: SurrogateConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_noiseless(mut self, noiseless: bool) -> Self {
        self.noiseless = noiseless;
        self
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn maximize(self) -> Self {
        self.with_direction(ObjectiveDirection::Maximize)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_surrogate(mut self, surrogate: SurrogateConfig) -> Self {
        self.surrogate = surrogate;
        self
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> HmResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Defaults overlaid with `HYPERMINT_*` environment variables.
    pub fn from_env() -> HmResult<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay settings looked up by environment variable name.
    pub fn overlay<F>(mut self, lookup: F) -> HmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_DEBUG) {
            self.debug = parse_flag(ENV_DEBUG, &raw)?;
        }
        if let Some(raw) = lookup(ENV_NOISELESS) {
            self.noiseless = parse_flag(ENV_NOISELESS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SEED) {
            let seed = raw.trim().parse().map_err(|e| ConfigError::InvalidSetting {
                key: ENV_SEED.to_string(),
                message: format!("{e}"),
            })?;
            self.seed = Some(seed);
        }
        if let Some(raw) = lookup(ENV_DIRECTION) {
            self.direction = match raw.trim().to_ascii_lowercase().as_str() {
                "min" | "minimize" => ObjectiveDirection::Minimize,
                "max" | "maximize" => ObjectiveDirection::Maximize,
                other => {
                    return Err(ConfigError::InvalidSetting {
                        key: ENV_DIRECTION.to_string(),
                        message: format!("expected 'minimize' or 'maximize', got '{other}'"),
                    }
                    .into())
                }
            };
        }
        Ok(self)
    }

    pub fn task_config(&self) -> TaskConfig {
        TaskConfig::objective(self.noiseless)
    }

    /// Surrogate settings with the session seed propagated.
    pub fn surrogate_config(&self) -> SurrogateConfig {
        let mut surrogate = self.surrogate.clone();
        if surrogate.seed.is_none() {
            surrogate.seed = self.seed.map(|s| s.wrapping_add(1));
        }
        surrogate
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidSetting {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
