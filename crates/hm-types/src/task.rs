//! Task configuration handed to the surrogate optimizer.

use serde::{Deserialize, Serialize};

/// Name of the single objective every session optimizes.
pub const MAIN_TASK: &str = "main";

/// Noise model assumed for the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    /// Deterministic objective; observations are interpolated exactly.
    Noiseless,
    /// Observations carry i.i.d. Gaussian noise of unknown scale.
    Gaussian,
}

impl Likelihood {
    pub fn from_noiseless(noiseless: bool) -> Self {
        if noiseless {
            Self::Noiseless
        } else {
            Self::Gaussian
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Objective,
}

/// Describes the scalar objective being optimized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub likelihood: Likelihood,
}

impl TaskConfig {
    pub fn objective(noiseless: bool) -> Self {
        Self {
            name: MAIN_TASK.to_string(),
            kind: TaskKind::Objective,
            likelihood: Likelihood::from_noiseless(noiseless),
        }
    }

    pub fn is_noiseless(&self) -> bool {
        self.likelihood == Likelihood::Noiseless
    }
}
