use thiserror::Error;

/// Main error type for the HyperMint system
#[derive(Error, Debug)]
pub enum HmError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Surrogate error: {0}")]
    Surrogate(#[from] SurrogateError),

    #[error("No trials recorded: at least one trial with a finite objective is required")]
    NoTrials,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while validating a parameter space or session settings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown kind '{kind}' for parameter '{parameter}'")]
    UnknownKind { parameter: String, kind: String },

    #[error("Malformed declaration for parameter '{parameter}': {message}")]
    Malformed { parameter: String, message: String },

    #[error("Invalid bounds for parameter '{parameter}': min {min}, max {max}")]
    InvalidBounds {
        parameter: String,
        min: String,
        max: String,
    },

    #[error("Parameter '{parameter}' declares no options")]
    EmptyOptions { parameter: String },

    #[error("Parameter '{parameter}' declares option {option} more than once")]
    DuplicateOption { parameter: String, option: String },

    #[error("Parameter '{parameter}' is declared more than once")]
    DuplicateParameter { parameter: String },

    #[error("Parameter space is empty")]
    EmptySpace,

    #[error("Invalid setting '{key}': {message}")]
    InvalidSetting { key: String, message: String },
}

/// Errors raised when an assignment does not match the declared space
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Missing value for parameter '{parameter}'")]
    Missing { parameter: String },

    #[error("Unexpected parameter '{parameter}' is not declared")]
    Unexpected { parameter: String },

    #[error("Parameter '{parameter}' expects {expected}, got {actual}")]
    TypeMismatch {
        parameter: String,
        expected: String,
        actual: String,
    },

    #[error("Value {value} for parameter '{parameter}' is outside [{min}, {max}]")]
    OutOfBounds {
        parameter: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Value {value} is not an option of parameter '{parameter}'")]
    UnknownOption { parameter: String, value: String },
}

/// Errors raised by the surrogate model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurrogateError {
    #[error("Input row has {actual} columns, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Got {inputs} input rows but {values} objective values")]
    LengthMismatch { inputs: usize, values: usize },

    #[error("Kernel matrix is not positive definite: {message}")]
    NotPositiveDefinite { message: String },

    #[error("Surrogate has not been fitted")]
    NotFitted,

    #[error("Invalid candidate vector: {message}")]
    InvalidVector { message: String },
}

/// Result type alias for HyperMint operations
pub type HmResult<T> = Result<T, HmError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::HmError::Validation(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfigError::UnknownKind {
            parameter: "x".to_string(),
            kind: "complex".to_string(),
        };

        assert!(error.to_string().contains("'x'"));
        assert!(error.to_string().contains("complex"));
    }

    #[test]
    fn test_error_conversion() {
        let param_error = ParameterError::Missing {
            parameter: "y".to_string(),
        };
        let hm_error: HmError = param_error.into();

        match hm_error {
            HmError::Parameter(ParameterError::Missing { parameter }) => assert_eq!(parameter, "y"),
            _ => panic!("Expected Parameter error"),
        }
    }

    #[test]
    fn test_macros() {
        let validation_err = validation_error!("Invalid value: {}", 42);
        assert!(matches!(validation_err, HmError::Validation(_)));
    }
}
