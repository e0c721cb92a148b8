//! Recorded trials and the objective sign convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::space::ParameterMap;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObjectiveDirection {
    #[default]
    Minimize,
    Maximize,
}

impl ObjectiveDirection {
    pub fn from_minimize(minimize: bool) -> Self {
        if minimize {
            Self::Minimize
        } else {
            Self::Maximize
        }
    }

    /// Map a caller-facing objective into minimize form.
    pub fn normalize(self, value: f64) -> f64 {
        match self {
            Self::Minimize => value,
            Self::Maximize => -value,
        }
    }

    /// Inverse of [`ObjectiveDirection::normalize`].
    pub fn denormalize(self, value: f64) -> f64 {
        self.normalize(value)
    }
}

/// One observed (assignment, objective) pair.
///
/// `objective` is the value as reported by the caller, before any sign flip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: Uuid,
    pub number: usize,
    pub parameters: ParameterMap,
    pub objective: f64,
    pub recorded_at: DateTime<Utc>,
}

impl Trial {
    pub fn new(number: usize, parameters: ParameterMap, objective: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            parameters,
            objective,
            recorded_at: Utc::now(),
        }
    }

    /// NaN objectives are kept in history but never count as observations.
    pub fn is_missing(&self) -> bool {
        self.objective.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::ParameterValue;

    #[test]
    fn direction_round_trips_sign() {
        let max = ObjectiveDirection::from_minimize(false);
        assert_eq!(max, ObjectiveDirection::Maximize);
        assert_eq!(max.normalize(2.5), -2.5);
        assert_eq!(max.denormalize(max.normalize(2.5)), 2.5);

        let min = ObjectiveDirection::default();
        assert_eq!(min.normalize(2.5), 2.5);
    }

    #[test]
    fn trial_records_caller_values() {
        let mut params = ParameterMap::new();
        params.insert("x".into(), ParameterValue::Float(0.5));

        let trial = Trial::new(0, params.clone(), 1.25);
        assert_eq!(trial.number, 0);
        assert_eq!(trial.parameters, params);
        assert!(!trial.is_missing());
        assert!(Trial::new(1, params, f64::NAN).is_missing());
    }

    #[test]
    fn trial_serialization() {
        let mut params = ParameterMap::new();
        params.insert("act".into(), "relu".into());
        let trial = Trial::new(3, params, 0.75);

        let json = serde_json::to_string(&trial).unwrap();
        let back: Trial = serde_json::from_str(&json).unwrap();
        assert_eq!(trial, back);
    }
}
