//! Parameter space declarations and concrete parameter values.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::errors::{ConfigError, HmResult, ParameterError};

/// A concrete assignment: parameter name to value.
pub type ParameterMap = HashMap<String, ParameterValue>;

/// Describes the domain of a single parameter.
///
/// Serialized in the dictionary form callers usually write by hand, e.g.
/// `{"type": "float", "min": -1, "max": 1}` or
/// `{"type": "enum", "options": ["sin", "cos"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterSpec {
    /// Continuous range [min, max].
    Float { min: f64, max: f64 },
    /// Integer range [min, max] inclusive.
    Int { min: i64, max: i64 },
    /// One of an ordered list of option literals.
    #[serde(rename = "enum", alias = "categorical")]
    Categorical { options: Vec<serde_json::Value> },
}

/// Option literals compare numerically across representations, so `1` and
/// `1.0` name the same option.
fn same_option(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    a == b
        || match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
}

impl ParameterSpec {
    /// Kind tags accepted in the dictionary form.
    pub const KINDS: [&'static str; 4] = ["float", "int", "enum", "categorical"];

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Float { .. } => "float",
            Self::Int { .. } => "int",
            Self::Categorical { .. } => "enum",
        }
    }

    /// Check bounds and options.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        match self {
            Self::Float { min, max } => {
                // The width must also be finite for sampling and unit scaling.
                if !min.is_finite() || !max.is_finite() || min > max || !(max - min).is_finite()
                {
                    return Err(ConfigError::InvalidBounds {
                        parameter: name.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
            }
            Self::Int { min, max } => {
                if min > max {
                    return Err(ConfigError::InvalidBounds {
                        parameter: name.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
            }
            Self::Categorical { options } => {
                if options.is_empty() {
                    return Err(ConfigError::EmptyOptions {
                        parameter: name.to_string(),
                    });
                }
                for (i, option) in options.iter().enumerate() {
                    if options[..i].iter().any(|seen| same_option(seen, option)) {
                        return Err(ConfigError::DuplicateOption {
                            parameter: name.to_string(),
                            option: option.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Position of `value` in the option list of a categorical parameter.
    pub fn option_index(&self, value: &ParameterValue) -> Option<usize> {
        let Self::Categorical { options } = self else {
            return None;
        };
        let literal = value.to_json();
        options.iter().position(|option| same_option(option, &literal))
    }

    /// Validate `value` against this spec and normalize its representation.
    ///
    /// Integral floats are accepted for `int` parameters and ints for `float`
    /// parameters; categorical values are replaced by the declared literal.
    pub fn check_value(
        &self,
        name: &str,
        value: &ParameterValue,
    ) -> Result<ParameterValue, ParameterError> {
        let mismatch = || ParameterError::TypeMismatch {
            parameter: name.to_string(),
            expected: self.kind_name().to_string(),
            actual: value.kind_name().to_string(),
        };

        match self {
            Self::Float { min, max } => {
                let v = match value {
                    ParameterValue::Float(v) => *v,
                    ParameterValue::Int(v) => *v as f64,
                    ParameterValue::Categorical(_) => return Err(mismatch()),
                };
                if !(*min..=*max).contains(&v) {
                    return Err(ParameterError::OutOfBounds {
                        parameter: name.to_string(),
                        value: v.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
                Ok(ParameterValue::Float(v))
            }
            Self::Int { min, max } => {
                let v = match value {
                    ParameterValue::Int(v) => *v,
                    ParameterValue::Float(v) if v.is_finite() && v.fract() == 0.0 => *v as i64,
                    _ => return Err(mismatch()),
                };
                if !(*min..=*max).contains(&v) {
                    return Err(ParameterError::OutOfBounds {
                        parameter: name.to_string(),
                        value: v.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
                Ok(ParameterValue::Int(v))
            }
            Self::Categorical { options } => match self.option_index(value) {
                Some(idx) => Ok(ParameterValue::Categorical(options[idx].clone())),
                None => Err(ParameterError::UnknownOption {
                    parameter: name.to_string(),
                    value: value.to_string(),
                }),
            },
        }
    }
}

/// A concrete parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Categorical(serde_json::Value),
}

impl ParameterValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::Categorical(_) => "enum",
        }
    }

    /// Numeric view of the value; categorical values are numeric only when
    /// the option literal is a JSON number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Categorical(v) => v.as_f64(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Categorical(v) => v.as_str(),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Float(v) => serde_json::json!(v),
            Self::Int(v) => serde_json::json!(v),
            Self::Categorical(v) => v.clone(),
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Categorical(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Categorical(serde_json::Value::String(v.to_string()))
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Categorical(serde_json::Value::String(v))
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Categorical(serde_json::Value::Bool(v))
    }
}

/// A single named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub spec: ParameterSpec,
}

/// The full parameter space, in declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub parameters: Vec<ParameterDef>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            spec,
        });
        self
    }

    pub fn add_float(self, name: impl Into<String>, min: f64, max: f64) -> Self {
        self.add(name, ParameterSpec::Float { min, max })
    }

    pub fn add_int(self, name: impl Into<String>, min: i64, max: i64) -> Self {
        self.add(name, ParameterSpec::Int { min, max })
    }

    pub fn add_categorical<V: Into<serde_json::Value>>(
        self,
        name: impl Into<String>,
        options: impl IntoIterator<Item = V>,
    ) -> Self {
        let options = options.into_iter().map(Into::into).collect();
        self.add(name, ParameterSpec::Categorical { options })
    }

    /// Parse the dictionary form `{"name": {"type": ..., ...}, ...}`.
    ///
    /// Key order of the document is kept as the declaration order. The input
    /// is only read; the returned space is an independent copy.
    pub fn from_json(value: &serde_json::Value) -> HmResult<Self> {
        let object = value.as_object().ok_or_else(|| ConfigError::Malformed {
            parameter: String::new(),
            message: "parameter space must be a JSON object".to_string(),
        })?;

        let mut space = Self::new();
        for (name, entry) in object {
            let kind = entry
                .get("type")
                .and_then(|k| k.as_str())
                .ok_or_else(|| ConfigError::Malformed {
                    parameter: name.clone(),
                    message: "missing string field 'type'".to_string(),
                })?;
            if !ParameterSpec::KINDS.contains(&kind) {
                return Err(ConfigError::UnknownKind {
                    parameter: name.clone(),
                    kind: kind.to_string(),
                }
                .into());
            }

            // Extra keys such as "size" are tolerated and dropped.
            let spec: ParameterSpec =
                serde_json::from_value(entry.clone()).map_err(|e| ConfigError::Malformed {
                    parameter: name.clone(),
                    message: e.to_string(),
                })?;
            space = space.add(name.clone(), spec);
        }

        space.validate()?;
        Ok(space)
    }

    pub fn from_json_str(s: &str) -> HmResult<Self> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        Self::from_json(&value)
    }

    /// Dictionary form of the space, the inverse of [`ParameterSpace::from_json`].
    pub fn to_json(&self) -> HmResult<serde_json::Value> {
        let mut object = serde_json::Map::new();
        for param in &self.parameters {
            object.insert(param.name.clone(), serde_json::to_value(&param.spec)?);
        }
        Ok(serde_json::Value::Object(object))
    }

    /// Validate every parameter and reject duplicate names or an empty space.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parameters.is_empty() {
            return Err(ConfigError::EmptySpace);
        }
        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(ConfigError::DuplicateParameter {
                    parameter: param.name.clone(),
                });
            }
            param.spec.validate(&param.name)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.spec)
    }

    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDef> {
        self.parameters.iter()
    }

    /// Check that `values` covers exactly the declared parameters and that
    /// every value fits its spec. Returns the normalized assignment.
    pub fn check_assignment(&self, values: &ParameterMap) -> Result<ParameterMap, ParameterError> {
        let mut unexpected: Vec<&String> = values
            .keys()
            .filter(|name| self.get(name).is_none())
            .collect();
        unexpected.sort();
        if let Some(name) = unexpected.first() {
            return Err(ParameterError::Unexpected {
                parameter: name.to_string(),
            });
        }

        let mut normalized = ParameterMap::with_capacity(self.len());
        for param in &self.parameters {
            let value = values.get(&param.name).ok_or_else(|| ParameterError::Missing {
                parameter: param.name.clone(),
            })?;
            normalized.insert(param.name.clone(), param.spec.check_value(&param.name, value)?);
        }
        Ok(normalized)
    }
}
