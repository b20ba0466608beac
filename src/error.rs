//! Error types for semalign operations.
//!
//! Every failure is fail-fast: configuration and dimension problems are usage
//! errors, and numerical failures from the linear-algebra layer are surfaced
//! unchanged.

use thiserror::Error;

/// Main error type for semalign operations.
///
/// # Examples
///
/// ```
/// use semalign::error::SemAlignError;
///
/// let err = SemAlignError::DimensionMismatch {
///     expected: "384 input features".to_string(),
///     actual: "380".to_string(),
/// };
/// assert!(err.to_string().contains("dimension mismatch"));
/// ```
#[derive(Debug, Error)]
pub enum SemAlignError {
    /// A constructor or parser received an unsupported value.
    #[error("invalid configuration: {param} = {value}, expected {constraint}")]
    InvalidConfiguration {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// `transform`/`eval` was called before `fit` populated the learned state.
    #[error("{model} is not fitted, call fit() first")]
    NotFitted {
        /// Model name
        model: &'static str,
    },

    /// Feature or observation counts disagree with the configuration or with
    /// each other.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// A linear system could not be solved.
    #[error("singular matrix in {context}")]
    SingularMatrix {
        /// Where the inversion was attempted
        context: &'static str,
    },

    /// A numeric primitive failed to converge or produced invalid values.
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl SemAlignError {
    /// Create a dimension mismatch error with descriptive context.
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(param: &str, value: impl ToString, constraint: &str) -> Self {
        Self::InvalidConfiguration {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }
}

/// Convenience type alias for semalign results.
pub type Result<T> = std::result::Result<T, SemAlignError>;
