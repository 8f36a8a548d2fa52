use thiserror::Error;

use crate::parameters::{BoundsError, ExpressionError, ParameterError};

/// Error types for the lmcompose-rs library.
#[derive(Error, Debug)]
pub enum ComposeError {
    /// A component could not be constructed from the supplied arguments.
    #[error("Invalid arguments for component '{kind}': {message}")]
    InvalidComponentArguments {
        kind: String,
        /// Names of required arguments that were not supplied.
        missing: Vec<String>,
        message: String,
    },

    /// A component index or reference is no longer valid.
    #[error("Component not found: index {index} (model has {len} components)")]
    ComponentNotFound { index: usize, len: usize },

    /// The supplied parameter names do not match the model's effective names.
    #[error("Parameter set mismatch: expected {expected:?}, found {found:?}")]
    ParameterSetMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// Error raised while parsing, rewriting or evaluating an expression.
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Error indicating a mismatch in array lengths.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The fit engine could not produce a result.
    #[error("Fit failed: {0}")]
    FitFailure(String),

    /// No unused prefix could be generated.
    #[error("Prefix space exhausted for '{0}'")]
    PrefixExhausted(String),

    /// Invalid configuration values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed from JSON.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl From<BoundsError> for ComposeError {
    fn from(err: BoundsError) -> Self {
        ComposeError::Parameter(ParameterError::from(err))
    }
}

/// Result type alias for lmcompose-rs operations.
pub type Result<T> = std::result::Result<T, ComposeError>;

impl ComposeError {
    /// Whether the caller should refresh its view of the model (stale selection
    /// or stale parameter set) rather than re-prompt the user.
    pub fn is_stale_view(&self) -> bool {
        matches!(
            self,
            ComposeError::ComponentNotFound { .. } | ComposeError::ParameterSetMismatch { .. }
        )
    }
}
