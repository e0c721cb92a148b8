//! Translation between parameter assignments and numeric vectors.
//!
//! Two encodings are used:
//!
//! * **raw**: one column per parameter in declaration order. Numeric
//!   parameters keep their value, categorical parameters store the index of
//!   the selected option. This is what callers hand to
//!   [`SurrogateOptimizer::fit`](crate::SurrogateOptimizer::fit) and what
//!   [`SurrogateOptimizer::suggest`](crate::SurrogateOptimizer::suggest)
//!   returns.
//! * **unit**: the GP's input space. Numeric parameters are scaled to
//!   `[0, 1]`, categorical parameters are one-hot encoded.

use rand::Rng;

use hm_types::{
    HmResult, ParameterError, ParameterMap, ParameterSpace, ParameterSpec, ParameterValue,
    SurrogateError,
};

/// Encoder for a fixed parameter space.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskGroup {
    space: ParameterSpace,
    num_dims: usize,
}

impl TaskGroup {
    pub fn new(space: &ParameterSpace) -> Self {
        let num_dims = space
            .iter()
            .map(|p| match &p.spec {
                ParameterSpec::Categorical { options } => options.len(),
                _ => 1,
            })
            .sum();
        Self {
            space: space.clone(),
            num_dims,
        }
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    /// Width of a raw row.
    pub fn num_params(&self) -> usize {
        self.space.len()
    }

    /// Width of a unit-space vector.
    pub fn num_dims(&self) -> usize {
        self.num_dims
    }

    /// Encode a (previously checked) assignment as a raw row.
    pub fn encode_raw(&self, values: &ParameterMap) -> HmResult<Vec<f64>> {
        let mut row = Vec::with_capacity(self.num_params());
        for param in self.space.iter() {
            let value = values.get(&param.name).ok_or_else(|| ParameterError::Missing {
                parameter: param.name.clone(),
            })?;
            let encoded = match &param.spec {
                ParameterSpec::Categorical { .. } => {
                    let idx = param.spec.option_index(value).ok_or_else(|| {
                        ParameterError::UnknownOption {
                            parameter: param.name.clone(),
                            value: value.to_string(),
                        }
                    })?;
                    idx as f64
                }
                _ => value.as_f64().ok_or_else(|| ParameterError::TypeMismatch {
                    parameter: param.name.clone(),
                    expected: param.spec.kind_name().to_string(),
                    actual: value.kind_name().to_string(),
                })?,
            };
            row.push(encoded);
        }
        Ok(row)
    }

    /// Decode a raw row into an assignment, casting each column to the
    /// declared kind. Numeric values are clamped to their bounds and ints are
    /// rounded.
    pub fn decode_raw(&self, row: &[f64]) -> HmResult<ParameterMap> {
        self.check_width(row.len(), self.num_params())?;
        let mut values = ParameterMap::with_capacity(self.num_params());
        for (param, &x) in self.space.iter().zip(row) {
            if !x.is_finite() {
                return Err(SurrogateError::InvalidVector {
                    message: format!("non-finite value {x} for parameter '{}'", param.name),
                }
                .into());
            }
            let value = match &param.spec {
                ParameterSpec::Float { min, max } => ParameterValue::Float(x.clamp(*min, *max)),
                ParameterSpec::Int { min, max } => {
                    ParameterValue::Int((x.round() as i64).clamp(*min, *max))
                }
                ParameterSpec::Categorical { options } => {
                    let idx = (x.round().max(0.0) as usize).min(options.len() - 1);
                    ParameterValue::Categorical(options[idx].clone())
                }
            };
            values.insert(param.name.clone(), value);
        }
        Ok(values)
    }

    /// Map a raw row into the unit cube.
    pub fn raw_to_unit(&self, row: &[f64]) -> HmResult<Vec<f64>> {
        self.check_width(row.len(), self.num_params())?;
        let mut unit = Vec::with_capacity(self.num_dims);
        for (param, &x) in self.space.iter().zip(row) {
            match &param.spec {
                ParameterSpec::Float { min, max } => unit.push(scale(x, *min, *max)),
                ParameterSpec::Int { min, max } => unit.push(scale(x, *min as f64, *max as f64)),
                ParameterSpec::Categorical { options } => {
                    let idx = (x.round().max(0.0) as usize).min(options.len() - 1);
                    unit.extend((0..options.len()).map(|i| if i == idx { 1.0 } else { 0.0 }));
                }
            }
        }
        Ok(unit)
    }

    /// Map a unit-cube vector back to a raw row. Categorical blocks decode to
    /// their argmax.
    pub fn unit_to_raw(&self, unit: &[f64]) -> HmResult<Vec<f64>> {
        self.check_width(unit.len(), self.num_dims)?;
        let mut row = Vec::with_capacity(self.num_params());
        let mut offset = 0;
        for param in self.space.iter() {
            match &param.spec {
                ParameterSpec::Float { min, max } => {
                    row.push(unscale(unit[offset], *min, *max));
                    offset += 1;
                }
                ParameterSpec::Int { min, max } => {
                    row.push(unscale(unit[offset], *min as f64, *max as f64).round());
                    offset += 1;
                }
                ParameterSpec::Categorical { options } => {
                    let block = &unit[offset..offset + options.len()];
                    let idx = block
                        .iter()
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
                            if v > best.1 {
                                (i, v)
                            } else {
                                best
                            }
                        })
                        .0;
                    row.push(idx as f64);
                    offset += options.len();
                }
            }
        }
        Ok(row)
    }

    /// Assignment to unit-cube vector.
    pub fn vectorify(&self, values: &ParameterMap) -> HmResult<Vec<f64>> {
        self.raw_to_unit(&self.encode_raw(values)?)
    }

    /// Unit-cube vector to assignment.
    pub fn paramify(&self, unit: &[f64]) -> HmResult<ParameterMap> {
        self.decode_raw(&self.unit_to_raw(unit)?)
    }

    /// Uniform point of the unit cube; categorical blocks get a random
    /// one-hot.
    pub fn sample_unit<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let mut unit = Vec::with_capacity(self.num_dims);
        for param in self.space.iter() {
            match &param.spec {
                ParameterSpec::Categorical { options } => {
                    let idx = rng.gen_range(0..options.len());
                    unit.extend((0..options.len()).map(|i| if i == idx { 1.0 } else { 0.0 }));
                }
                _ => unit.push(rng.gen::<f64>()),
            }
        }
        unit
    }

    /// Local move around `unit`: numeric dimensions are shifted by up to
    /// `radius`, categorical blocks are redrawn with probability `radius`.
    pub fn perturb_unit<R: Rng + ?Sized>(&self, unit: &[f64], radius: f64, rng: &mut R) -> Vec<f64> {
        let mut out = unit.to_vec();
        let mut offset = 0;
        for param in self.space.iter() {
            match &param.spec {
                ParameterSpec::Categorical { options } => {
                    if rng.gen::<f64>() < radius {
                        let idx = rng.gen_range(0..options.len());
                        for i in 0..options.len() {
                            out[offset + i] = if i == idx { 1.0 } else { 0.0 };
                        }
                    }
                    offset += options.len();
                }
                _ => {
                    let shift = rng.gen_range(-radius..=radius);
                    out[offset] = (out[offset] + shift).clamp(0.0, 1.0);
                    offset += 1;
                }
            }
        }
        out
    }

    fn check_width(&self, actual: usize, expected: usize) -> HmResult<()> {
        if actual != expected {
            return Err(SurrogateError::DimensionMismatch { expected, actual }.into());
        }
        Ok(())
    }
}

fn scale(x: f64, min: f64, max: f64) -> f64 {
    if max > min {
        ((x - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn unscale(u: f64, min: f64, max: f64) -> f64 {
    min + u.clamp(0.0, 1.0) * (max - min)
}
