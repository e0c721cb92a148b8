//! GP-based chooser: hyperparameter fitting and candidate selection.

use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hm_types::{HmError, HmResult, ParameterSpace, SurrogateError, TaskConfig};

use crate::acquisition::expected_improvement;
use crate::encoding::TaskGroup;
use crate::gp::{GaussianProcess, GpHypers};
use crate::SurrogateOptimizer;

/// Settings for [`GpChooser`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurrogateConfig {
    /// Uniform random candidates scored per suggestion.
    pub n_candidates: usize,
    /// Perturbations of the incumbent scored per suggestion.
    pub n_local: usize,
    /// Step size of incumbent perturbations, in unit-cube coordinates.
    pub local_radius: f64,
    /// Grid searched when fitting hyperparameters.
    pub length_scales: Vec<f64>,
    pub amplitudes: Vec<f64>,
    /// Ignored for noiseless tasks.
    pub noise_levels: Vec<f64>,
    /// Diagonal jitter added before factorization.
    pub jitter: f64,
    /// EI exploration offset, relative to the output scale.
    pub xi: f64,
    pub seed: Option<u64>,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            n_candidates: 1000,
            n_local: 100,
            local_radius: 0.1,
            length_scales: vec![0.05, 0.1, 0.2, 0.4, 0.8, 1.6],
            amplitudes: vec![0.5, 1.0, 2.0],
            noise_levels: vec![1e-4, 1e-3, 1e-2, 1e-1],
            jitter: 1e-6,
            xi: 0.01,
            seed: None,
        }
    }
}

impl SurrogateConfig {
    pub fn with_candidates(mut self, n_candidates: usize, n_local: usize) -> Self {
        self.n_candidates = n_candidates;
        self.n_local = n_local;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_xi(mut self, xi: f64) -> Self {
        self.xi = xi;
        self
    }
}

/// Default [`SurrogateOptimizer`]: a Matern 5/2 GP whose hyperparameters
/// maximize the marginal likelihood over a grid, queried by Expected
/// Improvement.
#[derive(Debug)]
pub struct GpChooser {
    config: SurrogateConfig,
    task_group: TaskGroup,
    rng: ChaCha8Rng,
    model: Option<GaussianProcess>,
    /// Best observed point in unit coordinates, with its objective.
    incumbent: Option<(Vec<f64>, f64)>,
}

impl GpChooser {
    pub fn new(space: &ParameterSpace, config: SurrogateConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            task_group: TaskGroup::new(space),
            rng,
            model: None,
            incumbent: None,
        }
    }

    pub fn config(&self) -> &SurrogateConfig {
        &self.config
    }

    pub fn task_group(&self) -> &TaskGroup {
        &self.task_group
    }

    /// Whether the last `fit` saw at least one finite observation.
    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn hyper_grid(&self, task: &TaskConfig, cached: Option<GpHypers>) -> Vec<GpHypers> {
        let noise_levels = if task.is_noiseless() {
            vec![0.0]
        } else {
            self.config.noise_levels.clone()
        };

        let mut grid = Vec::new();
        if let Some(mut h) = cached {
            if task.is_noiseless() {
                h.noise = 0.0;
            }
            grid.push(h);
        }
        for &length_scale in &self.config.length_scales {
            for &amplitude in &self.config.amplitudes {
                for &noise in &noise_levels {
                    let h = GpHypers {
                        length_scale,
                        amplitude,
                        noise,
                    };
                    if !grid.contains(&h) {
                        grid.push(h);
                    }
                }
            }
        }
        grid
    }
}

impl SurrogateOptimizer for GpChooser {
    type Hypers = GpHypers;

    fn fit(
        &mut self,
        inputs: &[Vec<f64>],
        values: &[f64],
        hypers: Option<GpHypers>,
        task: &TaskConfig,
    ) -> HmResult<GpHypers> {
        if inputs.len() != values.len() {
            return Err(SurrogateError::LengthMismatch {
                inputs: inputs.len(),
                values: values.len(),
            }
            .into());
        }

        let mut rows = Vec::with_capacity(inputs.len());
        let mut ys = Vec::with_capacity(values.len());
        for (row, &y) in inputs.iter().zip(values) {
            let unit = self.task_group.raw_to_unit(row)?;
            // Missing observations.
            if !y.is_finite() {
                continue;
            }
            rows.push(unit);
            ys.push(y);
        }
        if ys.len() < values.len() {
            debug!("Skipping {} missing observations", values.len() - ys.len());
        }

        if ys.is_empty() {
            debug!("No observations yet, sampling from the prior");
            self.model = None;
            self.incumbent = None;
            return Ok(hypers.unwrap_or_default());
        }

        let best_idx = ys
            .iter()
            .enumerate()
            .fold(0, |best, (i, &y)| if y < ys[best] { i } else { best });
        self.incumbent = Some((rows[best_idx].clone(), ys[best_idx]));

        let n = ys.len();
        let x = Array2::from_shape_vec((n, self.task_group.num_dims()), rows.concat()).map_err(
            |e| SurrogateError::InvalidVector {
                message: e.to_string(),
            },
        )?;
        let y = Array1::from_vec(ys);

        let mut best: Option<GaussianProcess> = None;
        let mut last_err: Option<HmError> = None;
        for h in self.hyper_grid(task, hypers) {
            match GaussianProcess::fit(x.clone(), &y, h, self.config.jitter) {
                Ok(gp) => {
                    let better = best
                        .as_ref()
                        .map_or(true, |b| gp.log_marginal_likelihood() > b.log_marginal_likelihood());
                    if better {
                        best = Some(gp);
                    }
                }
                Err(e) => last_err = Some(e),
            }
        }

        let model = match best {
            Some(gp) => gp,
            None => return Err(last_err.unwrap_or(SurrogateError::NotFitted.into())),
        };
        let fitted = *model.hypers();
        debug!(
            "Fitted GP on {} observations: length_scale={}, amplitude={}, noise={}, lml={:.4}",
            n,
            fitted.length_scale,
            fitted.amplitude,
            fitted.noise,
            model.log_marginal_likelihood()
        );
        self.model = Some(model);
        Ok(fitted)
    }

    fn suggest(&mut self) -> HmResult<Vec<f64>> {
        let (model, (best_unit, best_y)) = match (&self.model, &self.incumbent) {
            (Some(model), Some(incumbent)) => (model, incumbent),
            _ => {
                let unit = self.task_group.sample_unit(&mut self.rng);
                return self.task_group.unit_to_raw(&unit);
            }
        };

        let radius = self.config.local_radius;
        let mut candidates: Vec<Vec<f64>> = (0..self.config.n_candidates)
            .map(|_| self.task_group.sample_unit(&mut self.rng))
            .collect();
        // Alternate coarse and fine moves around the incumbent.
        candidates.extend((0..self.config.n_local).map(|i| {
            let r = if i % 2 == 0 { radius } else { radius * 0.1 };
            self.task_group.perturb_unit(best_unit, r, &mut self.rng)
        }));
        if candidates.is_empty() {
            candidates.push(self.task_group.sample_unit(&mut self.rng));
        }

        let xi = self.config.xi * model.output_scale();
        let scores: Vec<f64> = candidates
            .par_iter()
            .map(|c| {
                let (mean, var) = model.predict(ArrayView1::from(c.as_slice()));
                expected_improvement(mean, var, *best_y, xi)
            })
            .collect();

        let (idx, score) = scores
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &s)| {
                if s > best.1 {
                    (i, s)
                } else {
                    best
                }
            });
        debug!("Selected candidate {} of {} with EI {:.3e}", idx, candidates.len(), score);

        self.task_group.unit_to_raw(&candidates[idx])
    }

    fn name(&self) -> &str {
        "gp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic_history(xs: &[f64]) -> (Vec<Vec<f64>>, Vec<f64>) {
        let inputs = xs.iter().map(|&x| vec![x]).collect();
        let values = xs.iter().map(|x| x * x).collect();
        (inputs, values)
    }

    fn chooser() -> GpChooser {
        let space = ParameterSpace::new().add_float("x", -3.0, 3.0);
        GpChooser::new(&space, SurrogateConfig::default().with_seed(11))
    }

    #[test]
    fn unfitted_suggest_samples_prior() {
        let mut chooser = chooser();
        let task = TaskConfig::objective(false);
        let hypers = chooser.fit(&[], &[], None, &task).unwrap();
        assert_eq!(hypers, GpHypers::default());
        assert!(!chooser.is_fitted());

        let raw = chooser.suggest().unwrap();
        assert_eq!(raw.len(), 1);
        assert!((-3.0..=3.0).contains(&raw[0]));
    }

    #[test]
    fn fit_ignores_missing_values() {
        let mut chooser = chooser();
        let task = TaskConfig::objective(false);
        let inputs = vec![vec![1.0], vec![2.0]];
        chooser.fit(&inputs, &[f64::NAN, f64::NAN], None, &task).unwrap();
        assert!(!chooser.is_fitted());

        chooser.fit(&inputs, &[1.0, f64::NAN], None, &task).unwrap();
        assert!(chooser.is_fitted());
    }

    #[test]
    fn fit_rejects_mismatched_shapes() {
        let mut chooser = chooser();
        let task = TaskConfig::objective(false);
        assert!(chooser.fit(&[vec![0.0]], &[1.0, 2.0], None, &task).is_err());
        assert!(chooser.fit(&[vec![0.0, 1.0]], &[1.0], None, &task).is_err());
    }

    #[test]
    fn noiseless_task_pins_noise() {
        let mut chooser = chooser();
        let (inputs, values) = quadratic_history(&[-2.0, -1.0, 0.5, 1.5, 2.5]);
        let cached = GpHypers {
            noise: 0.5,
            ..Default::default()
        };
        let hypers = chooser
            .fit(&inputs, &values, Some(cached), &TaskConfig::objective(true))
            .unwrap();
        assert_eq!(hypers.noise, 0.0);
    }

    #[test]
    fn suggestion_moves_toward_minimum() {
        let mut chooser = chooser();
        let task = TaskConfig::objective(false);
        let (inputs, values) = quadratic_history(&[-3.0, -2.0, -1.0, -0.4, 0.6, 1.5, 2.2, 3.0]);
        let hypers = chooser.fit(&inputs, &values, None, &task).unwrap();
        assert!(hypers.length_scale > 0.0);

        let raw = chooser.suggest().unwrap();
        assert!(raw[0].abs() < 1.5, "suggestion {} too far from 0", raw[0]);
    }

    #[test]
    fn name_is_stable() {
        assert_eq!(chooser().name(), "gp");
    }
}
