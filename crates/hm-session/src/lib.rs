//! # hm-session
//!
//! A thin session over the HyperMint surrogate optimizer.
//!
//! A [`ParameterOptimizerSession`] owns a validated parameter space and the
//! trial history. Callers ask it for suggestions, evaluate their objective,
//! and report the result back; the session handles encoding, the objective
//! sign convention, and diagnostic suppression around the surrogate.

mod config;
mod diagnostics;
mod random;
mod session;

pub use config::{SessionConfig, ENV_DEBUG, ENV_DIRECTION, ENV_NOISELESS, ENV_SEED};
pub use diagnostics::DiagnosticGuard;
pub use random::sample_value;
pub use session::{ParameterOptimizerSession, SessionState};

pub use hm_surrogate::{GpChooser, GpHypers, SurrogateConfig, SurrogateOptimizer};
pub use hm_types::{
    HmError, HmResult, ObjectiveDirection, ParameterMap, ParameterSpace, ParameterSpec,
    ParameterValue, TaskConfig, Trial,
};
