//! Gaussian Process regression with a Matern 5/2 kernel.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use hm_types::{HmResult, SurrogateError};

/// Kernel and noise hyperparameters of the GP.
///
/// Values refer to the unit-cube inputs and to standardized outputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpHypers {
    pub length_scale: f64,
    pub amplitude: f64,
    pub noise: f64,
}

impl Default for GpHypers {
    fn default() -> Self {
        Self {
            length_scale: 0.35,
            amplitude: 1.0,
            noise: 1e-3,
        }
    }
}

/// Matern 5/2 covariance between two points.
pub fn matern52(a: ArrayView1<f64>, b: ArrayView1<f64>, hypers: &GpHypers) -> f64 {
    let dist_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    let r = dist_sq.sqrt() / hypers.length_scale;
    let sqrt5_r = 5.0_f64.sqrt() * r;
    hypers.amplitude * (1.0 + sqrt5_r + 5.0 / 3.0 * r * r) * (-sqrt5_r).exp()
}

fn kernel_matrix(x: &Array2<f64>, hypers: &GpHypers) -> Array2<f64> {
    let n = x.nrows();
    let mut k = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let v = matern52(x.row(i), x.row(j), hypers);
            k[[i, j]] = v;
            k[[j, i]] = v;
        }
    }
    k
}

/// Lower Cholesky factor of `a`. Fails if a pivot is not positive.
pub fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>, SurrogateError> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(SurrogateError::NotPositiveDefinite {
                        message: format!("pivot {i} is {sum:e}"),
                    });
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Cholesky with escalating diagonal jitter, up to five attempts.
fn cholesky_with_jitter(a: &Array2<f64>, jitter: f64) -> Result<Array2<f64>, SurrogateError> {
    let mut last_err = None;
    let mut extra = jitter;
    for _ in 0..5 {
        let mut shifted = a.clone();
        shifted.diag_mut().mapv_inplace(|d| d + extra);
        match cholesky(&shifted) {
            Ok(l) => return Ok(l),
            Err(e) => last_err = Some(e),
        }
        extra *= 10.0;
    }
    Err(last_err.unwrap_or(SurrogateError::NotFitted))
}

/// Solve `L x = b` for lower triangular `L`.
fn solve_lower(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[[i, j]] * x[j];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Solve `L^T x = b` for lower triangular `L`.
fn solve_upper_transposed(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= l[[j, i]] * x[j];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// A fitted GP posterior.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    hypers: GpHypers,
    x_train: Array2<f64>,
    l_chol: Array2<f64>,
    /// `(K + noise I)^-1 y` on standardized outputs.
    alpha: Array1<f64>,
    y_mean: f64,
    y_std: f64,
    log_likelihood: f64,
}

impl GaussianProcess {
    /// Condition a GP on `(x, y)`.
    ///
    /// Outputs are standardized before fitting and predictions are mapped
    /// back to the original scale.
    pub fn fit(x: Array2<f64>, y: &Array1<f64>, hypers: GpHypers, jitter: f64) -> HmResult<Self> {
        let n = y.len();
        if x.nrows() != n {
            return Err(SurrogateError::LengthMismatch {
                inputs: x.nrows(),
                values: n,
            }
            .into());
        }
        if n == 0 {
            return Err(SurrogateError::NotFitted.into());
        }

        let y_mean = y.mean().unwrap_or(0.0);
        let mut y_std = y.std(0.0);
        if !(y_std > 1e-12) {
            y_std = 1.0;
        }
        let y_norm = y.mapv(|v| (v - y_mean) / y_std);

        let mut k = kernel_matrix(&x, &hypers);
        k.diag_mut().mapv_inplace(|d| d + hypers.noise);
        let l_chol = cholesky_with_jitter(&k, jitter)?;
        let alpha = solve_upper_transposed(&l_chol, &solve_lower(&l_chol, &y_norm));

        let log_det: f64 = l_chol.diag().iter().map(|d| d.ln()).sum();
        let log_likelihood = -0.5 * y_norm.dot(&alpha)
            - log_det
            - 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();

        Ok(Self {
            hypers,
            x_train: x,
            l_chol,
            alpha,
            y_mean,
            y_std,
            log_likelihood,
        })
    }

    pub fn hypers(&self) -> &GpHypers {
        &self.hypers
    }

    pub fn num_observations(&self) -> usize {
        self.x_train.nrows()
    }

    /// Standard deviation used to standardize the training outputs.
    pub fn output_scale(&self) -> f64 {
        self.y_std
    }

    /// Log marginal likelihood of the standardized training outputs.
    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Posterior mean and variance at `x`, in the original output scale.
    pub fn predict(&self, x: ArrayView1<f64>) -> (f64, f64) {
        let k_star: Array1<f64> = self
            .x_train
            .rows()
            .into_iter()
            .map(|row| matern52(row, x, &self.hypers))
            .collect();

        let mean = k_star.dot(&self.alpha) * self.y_std + self.y_mean;

        let v = solve_lower(&self.l_chol, &k_star);
        let var = (self.hypers.amplitude - v.dot(&v)).max(1e-12) * self.y_std * self.y_std;
        (mean, var)
    }
}
