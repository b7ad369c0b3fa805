//! Compile error types
//!
//! Defines all error conditions that can occur while turning a filter request
//! into a resolved read request.

use thiserror::Error;

/// Errors that can occur during filter compilation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Request has no database
    #[error("missing database")]
    MissingDatabase,

    /// Request has no measurement
    #[error("missing measurement")]
    MissingMeasurement,

    /// Condition text could not be parsed
    #[error("parse failure: {0}")]
    Parse(String),

    /// Binary operator with no predicate counterpart
    #[error("unsupported operator {0}")]
    UnsupportedOperator(String),

    /// Expression kind with no predicate counterpart
    #[error("unsupported expression {0}")]
    UnsupportedExpression(String),

    /// Malformed comparison against `time`
    #[error("invalid time condition: {0}")]
    InvalidTimeCondition(String),

    /// Expression that is not a usable condition
    #[error("invalid condition expression: {0}")]
    InvalidCondition(String),

    /// Time bounds that exclude every instant
    #[error("empty time range: start {start} is after end {end}")]
    EmptyTimeRange { start: i64, end: i64 },
}

impl CompileError {
    /// Validation errors are raised before any parsing takes place
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CompileError::MissingDatabase | CompileError::MissingMeasurement
        )
    }
}

/// Result type for compile operations
pub type CompileResult<T> = Result<T, CompileError>;
