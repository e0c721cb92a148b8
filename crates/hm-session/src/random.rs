//! Uniform sampling from declared parameter domains.

use rand::Rng;

use hm_types::{ConfigError, ParameterSpec, ParameterValue};

/// Draw one value uniformly from `spec`: continuous for floats, inclusive
/// discrete for ints, uniform over options for categoricals.
pub fn sample_value<R: Rng + ?Sized>(
    name: &str,
    spec: &ParameterSpec,
    rng: &mut R,
) -> Result<ParameterValue, ConfigError> {
    spec.validate(name)?;
    let value = match spec {
        ParameterSpec::Float { min, max } => ParameterValue::Float(rng.gen_range(*min..=*max)),
        ParameterSpec::Int { min, max } => ParameterValue::Int(rng.gen_range(*min..=*max)),
        ParameterSpec::Categorical { options } => {
            let idx = rng.gen_range(0..options.len());
            ParameterValue::Categorical(options[idx].clone())
        }
    };
    Ok(value)
}
