//! # hm-surrogate
//!
//! The surrogate optimizer behind a HyperMint session.
//!
//! Provides the [`SurrogateOptimizer`] seam the session talks to, the
//! [`TaskGroup`] encoder between assignments and numeric vectors, and the
//! default GP-based [`GpChooser`].

mod acquisition;
mod chooser;
mod encoding;
mod gp;

use hm_types::{HmResult, TaskConfig};

pub use acquisition::{expected_improvement, normal_cdf, normal_pdf};
pub use chooser::{GpChooser, SurrogateConfig};
pub use encoding::TaskGroup;
pub use gp::{cholesky, matern52, GaussianProcess, GpHypers};

/// A Bayesian optimization engine driven through raw encoded vectors.
///
/// Rows passed to [`fit`](SurrogateOptimizer::fit) and the vector returned by
/// [`suggest`](SurrogateOptimizer::suggest) use the raw encoding of
/// [`TaskGroup`]: one column per parameter, categorical values as option
/// indices. Objective values are in minimize form; NaN marks a missing
/// observation.
pub trait SurrogateOptimizer: Send {
    /// Hyperparameters carried between fits.
    type Hypers: Clone + std::fmt::Debug;

    /// Fit the model to the full history, starting from `hypers` when given.
    fn fit(
        &mut self,
        inputs: &[Vec<f64>],
        values: &[f64],
        hypers: Option<Self::Hypers>,
        task: &TaskConfig,
    ) -> HmResult<Self::Hypers>;

    /// Propose one raw candidate vector.
    fn suggest(&mut self) -> HmResult<Vec<f64>>;

    /// Human-readable engine name.
    fn name(&self) -> &str;
}
