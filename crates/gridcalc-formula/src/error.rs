//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
///
/// None of these escape [`FormulaEngine::evaluate`](crate::FormulaEngine::evaluate):
/// the facade renders them as `"Error: <message>"`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Tokenizer or parser error
    #[error("{0}")]
    Parse(String),

    /// Fewer arguments than the function accepts
    #[error("too few parameters for {0}")]
    TooFewParameters(String),

    /// More arguments than the function accepts
    #[error("too many parameters for {0}")]
    TooManyParameters(String),

    /// Identifier that is neither a function nor a cell reference
    #[error("the function \"{0}\" is not supported")]
    UnknownFunction(String),

    /// A cell being resolved was re-entered
    #[error("circular reference")]
    CircularReference,

    /// Malformed or unusable cell/range reference
    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    /// Sheet name that does not exist in the host
    #[error("invalid sheet reference: {0}")]
    InvalidSheetReference(String),

    /// Row, column, or argument index outside the allowed bounds
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),

    /// Criteria string of a conditional aggregate that cannot be used
    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Lookup value missing from the searched range
    #[error("value not found: {0}")]
    NotFound(String),

    /// Iterative solver gave up
    #[error("{0} failed to converge")]
    NoConvergence(&'static str),

    /// Argument of the wrong kind or outside the function's domain
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Division by zero
    #[error("division by zero")]
    DivideByZero,

    /// Arithmetic produced NaN
    #[error("bad expression")]
    BadExpression,
}

impl FormulaError {
    /// Shorthand for an [`FormulaError::Argument`] error
    pub fn argument<S: Into<String>>(msg: S) -> Self {
        FormulaError::Argument(msg.into())
    }

    /// Shorthand for a [`FormulaError::Parse`] error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        FormulaError::Parse(msg.into())
    }
}

impl From<gridcalc_core::Error> for FormulaError {
    fn from(err: gridcalc_core::Error) -> Self {
        FormulaError::InvalidReference(err.to_string())
    }
}
