//! The optimizer session: history bookkeeping and suggestion marshaling.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use hm_surrogate::{GpChooser, SurrogateOptimizer, TaskGroup};
use hm_types::{
    validation_error, HmError, HmResult, ObjectiveDirection, ParameterMap, ParameterSpace,
    TaskConfig, Trial,
};

use crate::config::SessionConfig;
use crate::diagnostics::DiagnosticGuard;
use crate::random::sample_value;

/// Whether the session has observed anything yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No trials recorded; suggestions come from the surrogate's prior.
    Unseeded,
    /// At least one trial recorded; suggestions condition on history.
    Seeded,
}

/// Adapter between name/value assignments and a [`SurrogateOptimizer`].
///
/// Objectives are stored in minimize form internally and reported back in
/// the caller's direction.
#[derive(Debug)]
pub struct ParameterOptimizerSession<S: SurrogateOptimizer = GpChooser> {
    space: ParameterSpace,
    config: SessionConfig,
    task_config: TaskConfig,
    task_group: TaskGroup,
    surrogate: S,
    trials: Vec<Trial>,
    /// One raw row per trial, rebuilt on every update.
    inputs: Vec<Vec<f64>>,
    /// One minimize-form objective per trial.
    values: Vec<f64>,
    hypers: Option<S::Hypers>,
    rng: ChaCha8Rng,
}

impl ParameterOptimizerSession<GpChooser> {
    /// Create a session backed by the default GP surrogate.
    pub fn new(space: &ParameterSpace, config: SessionConfig) -> HmResult<Self> {
        space.validate()?;
        let surrogate = GpChooser::new(space, config.surrogate_config());
        Self::with_surrogate(space, config, surrogate)
    }

    /// Shorthand for the common flags.
    pub fn with_flags(space: &ParameterSpace, noiseless: bool, minimize: bool) -> HmResult<Self> {
        let config = SessionConfig::default()
            .with_noiseless(noiseless)
            .with_direction(ObjectiveDirection::from_minimize(minimize));
        Self::new(space, config)
    }

    /// Create a session from the dictionary form of a parameter space.
    pub fn from_json(space: &serde_json::Value, config: SessionConfig) -> HmResult<Self> {
        Self::new(&ParameterSpace::from_json(space)?, config)
    }
}

impl<S: SurrogateOptimizer> ParameterOptimizerSession<S> {
    /// Create a session around a caller-provided surrogate.
    ///
    /// The space is copied; later changes to the caller's value have no
    /// effect on the session.
    pub fn with_surrogate(space: &ParameterSpace, config: SessionConfig, surrogate: S) -> HmResult<Self> {
        space.validate()?;
        let task_config = config.task_config();
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        info!(
            "Created optimizer session over {} parameters ({:?} likelihood, {:?}, surrogate '{}')",
            space.len(),
            task_config.likelihood,
            config.direction,
            surrogate.name()
        );

        Ok(Self {
            space: space.clone(),
            task_group: TaskGroup::new(space),
            config,
            task_config,
            surrogate,
            trials: Vec::new(),
            inputs: Vec::new(),
            values: Vec::new(),
            hypers: None,
            rng,
        })
    }

    /// Record the objective achieved by `parameter_values`.
    ///
    /// The mapping must name every declared parameter and nothing else, with
    /// values inside their declared domains. NaN objectives are recorded as
    /// missing observations; infinite ones are rejected.
    pub fn update(&mut self, parameter_values: &ParameterMap, objective: f64) -> HmResult<()> {
        if objective.is_infinite() {
            return Err(validation_error!("objective must be finite or NaN, got {}", objective));
        }
        let normalized = self.space.check_assignment(parameter_values)?;
        let row = self.task_group.encode_raw(&normalized)?;

        let was_unseeded = self.state() == SessionState::Unseeded;
        let number = self.trials.len();
        self.trials.push(Trial::new(number, normalized, objective));
        self.rebuild_history()?;

        if objective.is_nan() {
            warn!("Trial {} recorded with NaN objective; treated as missing", number);
        }
        debug!("Recorded trial {}: row={:?}, objective={}", number, row, objective);
        if was_unseeded {
            info!("Session seeded with its first trial");
        }
        Ok(())
    }

    fn rebuild_history(&mut self) -> HmResult<()> {
        self.inputs = self
            .trials
            .iter()
            .map(|t| self.task_group.encode_raw(&t.parameters))
            .collect::<HmResult<_>>()?;
        let direction = self.config.direction;
        self.values = self
            .trials
            .iter()
            .map(|t| direction.normalize(t.objective))
            .collect();
        Ok(())
    }

    /// Fit the surrogate to the full history and decode one suggestion.
    ///
    /// Unless `debug` is set, diagnostics emitted on this thread during the
    /// fit are suppressed.
    pub fn suggest(&mut self) -> HmResult<ParameterMap> {
        let raw = {
            let _diagnostics = DiagnosticGuard::for_debug(self.config.debug);
            self.fit_and_suggest()?
        };
        let suggestion = self.task_group.decode_raw(&raw)?;
        debug!("Suggested {:?}", suggestion);
        Ok(suggestion)
    }

    fn fit_and_suggest(&mut self) -> HmResult<Vec<f64>> {
        let hypers = self.surrogate.fit(
            &self.inputs,
            &self.values,
            self.hypers.clone(),
            &self.task_config,
        )?;
        self.hypers = Some(hypers);
        self.surrogate.suggest()
    }

    /// Draw every parameter uniformly from its declared domain, bypassing
    /// the surrogate.
    pub fn suggest_random(&mut self) -> HmResult<ParameterMap> {
        let mut suggestion = ParameterMap::with_capacity(self.space.len());
        for param in self.space.iter() {
            let value = sample_value(&param.name, &param.spec, &mut self.rng)?;
            suggestion.insert(param.name.clone(), value);
        }
        Ok(suggestion)
    }

    /// The best trial so far, ignoring NaN objectives. Ties go to the
    /// earliest trial.
    pub fn best_trial(&self) -> HmResult<&Trial> {
        self.trials
            .iter()
            .zip(&self.values)
            .filter(|(trial, _)| !trial.is_missing())
            .fold(None::<(&Trial, f64)>, |best, (trial, &value)| match best {
                Some((_, best_value)) if best_value <= value => best,
                _ => Some((trial, value)),
            })
            .map(|(trial, _)| trial)
            .ok_or(HmError::NoTrials)
    }

    /// Parameters and objective (in the caller's direction) of the best trial.
    pub fn get_best_parameters(&self) -> HmResult<(ParameterMap, f64)> {
        let best = self.best_trial()?;
        Ok((best.parameters.clone(), best.objective))
    }

    /// Run `n_trials` rounds of suggest, evaluate, update.
    pub fn optimize<F>(&mut self, n_trials: usize, mut objective: F) -> HmResult<(ParameterMap, f64)>
    where
        F: FnMut(&ParameterMap) -> f64,
    {
        for n in 0..n_trials {
            let suggestion = self.suggest()?;
            let value = objective(&suggestion);
            debug!("Iteration {}: objective {}", n, value);
            self.update(&suggestion, value)?;
        }
        let (best, value) = self.get_best_parameters()?;
        info!("Optimization finished after {} trials; best objective {}", self.len(), value);
        Ok((best, value))
    }

    pub fn state(&self) -> SessionState {
        if self.trials.is_empty() {
            SessionState::Unseeded
        } else {
            SessionState::Seeded
        }
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Recorded assignments in arrival order.
    pub fn parameter_values(&self) -> Vec<&ParameterMap> {
        self.trials.iter().map(|t| &t.parameters).collect()
    }

    /// Recorded objectives in arrival order, as reported by the caller.
    pub fn objective_values(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.objective).collect()
    }

    /// Encoded input matrix handed to the surrogate.
    pub fn inputs(&self) -> &[Vec<f64>] {
        &self.inputs
    }

    /// Minimize-form objectives handed to the surrogate.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn hypers(&self) -> Option<&S::Hypers> {
        self.hypers.as_ref()
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    pub fn task_config(&self) -> &TaskConfig {
        &self.task_config
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.config.direction
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn surrogate(&self) -> &S {
        &self.surrogate
    }

    /// Trial history as pretty-printed JSON. NaN objectives become `null`.
    pub fn history_json(&self) -> HmResult<String> {
        Ok(serde_json::to_string_pretty(&self.trials)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hm_surrogate::SurrogateConfig;
    use hm_types::{ConfigError, Likelihood, ParameterError, ParameterValue};
    use serde_json::json;

    fn space() -> ParameterSpace {
        ParameterSpace::new()
            .add_float("x", -2.0, 2.0)
            .add_int("y", 0, 3)
            .add_categorical("function", ["sin", "cos"])
    }

    fn params(x: f64, y: i64, function: &str) -> ParameterMap {
        let mut values = ParameterMap::new();
        values.insert("x".into(), x.into());
        values.insert("y".into(), y.into());
        values.insert("function".into(), function.into());
        values
    }

    fn session(config: SessionConfig) -> ParameterOptimizerSession {
        let config = config
            .with_seed(5)
            .with_surrogate(SurrogateConfig::default().with_candidates(200, 20));
        ParameterOptimizerSession::new(&space(), config).unwrap()
    }

    #[test]
    fn construction_builds_task_config() {
        let s = ParameterOptimizerSession::with_flags(&space(), true, false).unwrap();
        assert_eq!(s.task_config().likelihood, Likelihood::Noiseless);
        assert_eq!(s.task_config().name, "main");
        assert_eq!(s.direction(), ObjectiveDirection::Maximize);
        assert_eq!(s.state(), SessionState::Unseeded);
        assert!(s.hypers().is_none());
        assert!(s.is_empty());
    }

    #[test]
    fn construction_rejects_invalid_space() {
        let bad = ParameterSpace::new().add_int("n", 5, 1);
        assert!(matches!(
            ParameterOptimizerSession::new(&bad, SessionConfig::default()),
            Err(HmError::Config(ConfigError::InvalidBounds { .. }))
        ));
    }

    #[test]
    fn construction_rejects_unsampleable_float_range() {
        let huge = ParameterSpace::new().add_float("x", -f64::MAX, f64::MAX);
        assert!(matches!(
            ParameterOptimizerSession::new(&huge, SessionConfig::default().with_seed(1)),
            Err(HmError::Config(ConfigError::InvalidBounds { .. }))
        ));

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let spec = huge.get("x").unwrap();
        assert!(sample_value("x", spec, &mut rng).is_err());
    }

    #[test]
    fn from_json_reports_unknown_kind() {
        let doc = json!({"x": {"type": "quaternion"}});
        match ParameterOptimizerSession::from_json(&doc, SessionConfig::default()) {
            Err(HmError::Config(ConfigError::UnknownKind { parameter, kind })) => {
                assert_eq!(parameter, "x");
                assert_eq!(kind, "quaternion");
            }
            other => panic!("expected UnknownKind, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn update_rebuilds_encoded_history() {
        let mut s = session(SessionConfig::default().maximize());
        s.update(&params(1.0, 2, "cos"), 3.0).unwrap();
        s.update(&params(-1.0, 0, "sin"), 5.0).unwrap();

        assert_eq!(s.state(), SessionState::Seeded);
        assert_eq!(s.inputs(), &[vec![1.0, 2.0, 1.0], vec![-1.0, 0.0, 0.0]]);
        assert_eq!(s.values(), &[-3.0, -5.0]);
        assert_eq!(s.objective_values(), vec![3.0, 5.0]);
        assert_eq!(s.trials()[1].number, 1);
    }

    #[test]
    fn update_is_strict_about_keys() {
        let mut s = session(SessionConfig::default());
        let mut missing = params(0.0, 1, "sin");
        missing.remove("y");
        assert!(matches!(
            s.update(&missing, 1.0),
            Err(HmError::Parameter(ParameterError::Missing { .. }))
        ));

        let mut extra = params(0.0, 1, "sin");
        extra.insert("z".into(), 1.0.into());
        assert!(matches!(
            s.update(&extra, 1.0),
            Err(HmError::Parameter(ParameterError::Unexpected { .. }))
        ));
        assert!(s.is_empty(), "rejected updates must not be recorded");
    }

    #[test]
    fn update_rejects_infinite_objective() {
        let mut s = session(SessionConfig::default());
        assert!(matches!(
            s.update(&params(0.0, 1, "sin"), f64::INFINITY),
            Err(HmError::Validation(_))
        ));
        assert!(s.is_empty());
    }

    #[test]
    fn best_parameters_ignore_nan() {
        let mut s = session(SessionConfig::default());
        s.update(&params(0.5, 1, "sin"), 2.0).unwrap();
        s.update(&params(1.5, 2, "cos"), f64::NAN).unwrap();
        s.update(&params(-0.5, 3, "sin"), 1.0).unwrap();
        s.update(&params(0.0, 0, "cos"), 1.0).unwrap();

        let (best, value) = s.get_best_parameters().unwrap();
        assert_eq!(value, 1.0);
        assert_eq!(best, params(-0.5, 3, "sin"));
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn best_parameters_maximize_reports_original_sign() {
        let mut s = session(SessionConfig::default().maximize());
        s.update(&params(0.5, 1, "sin"), -4.0).unwrap();
        s.update(&params(1.0, 1, "sin"), -1.0).unwrap();
        s.update(&params(1.5, 1, "sin"), -9.0).unwrap();

        let (best, value) = s.get_best_parameters().unwrap();
        assert_eq!(value, -1.0);
        assert_eq!(best["x"], ParameterValue::Float(1.0));
    }

    #[test]
    fn best_parameters_without_trials() {
        let mut s = session(SessionConfig::default());
        assert!(matches!(s.get_best_parameters(), Err(HmError::NoTrials)));

        s.update(&params(0.5, 1, "sin"), f64::NAN).unwrap();
        assert!(matches!(s.get_best_parameters(), Err(HmError::NoTrials)));
    }

    #[test]
    fn suggest_returns_typed_values() {
        let mut s = session(SessionConfig::default());
        for _ in 0..4 {
            let suggestion = s.suggest().unwrap();
            assert!(matches!(suggestion["x"], ParameterValue::Float(_)));
            assert!(matches!(suggestion["y"], ParameterValue::Int(_)));
            assert!(["sin", "cos"].contains(&suggestion["function"].as_str().unwrap()));

            let x = suggestion["x"].as_f64().unwrap();
            let y = suggestion["y"].as_f64().unwrap();
            s.update(&suggestion, x * x + y).unwrap();
        }
        assert!(s.hypers().is_some());
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn suggest_random_respects_domains() {
        let mut s = session(SessionConfig::default());
        for _ in 0..50 {
            let suggestion = s.suggest_random().unwrap();
            assert!(s.space().check_assignment(&suggestion).is_ok());
        }
        assert!(s.is_empty());
    }

    #[test]
    fn numerically_equal_option_is_recorded_as_declared() {
        let space = ParameterSpace::new().add_categorical("b", [json!(1.5), json!(2)]);
        let mut s = ParameterOptimizerSession::new(&space, SessionConfig::default()).unwrap();
        let mut values = ParameterMap::new();
        values.insert("b".into(), ParameterValue::Float(2.0));
        s.update(&values, 1.0).unwrap();
        assert_eq!(s.inputs(), &[vec![1.0]]);
        assert_eq!(s.trials()[0].parameters["b"], ParameterValue::Categorical(json!(2)));
    }

    #[test]
    fn history_serializes_nan_as_null() {
        let mut s = session(SessionConfig::default());
        s.update(&params(0.5, 1, "sin"), f64::NAN).unwrap();
        let json: serde_json::Value = serde_json::from_str(&s.history_json().unwrap()).unwrap();
        assert!(json[0]["objective"].is_null());
        assert_eq!(json[0]["parameters"]["function"], "sin");
    }
}
