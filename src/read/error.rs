//! Read path error types

use thiserror::Error;

use crate::query::CompileError;
use crate::storage::{CursorKind, StorageError, Tags};

/// Errors raised while turning cursors into series
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaterializeError {
    /// Cursor value kind that has no sample representation
    #[error("unsupported cursor type {kind} for series {series}")]
    UnsupportedCursor { kind: CursorKind, series: Tags },

    /// The caller cancelled the read
    #[error("read cancelled")]
    Cancelled,
}

/// Errors from delivering a series to a sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The receiving side went away
    #[error("stream closed by peer")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}

/// Any failure of a raw read, tagged by the stage that failed
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("materialize error: {0}")]
    Materialize(#[from] MaterializeError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ReadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReadError::Materialize(MaterializeError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Tag;

    #[test]
    fn test_unsupported_cursor_names_kind_and_series() {
        let err = MaterializeError::UnsupportedCursor {
            kind: CursorKind::Boolean,
            series: Tags::new(vec![Tag::new("host", "a")]),
        };
        assert_eq!(
            err.to_string(),
            "unsupported cursor type bool for series {host=a}"
        );
    }

    #[test]
    fn test_read_error_stage_prefix() {
        let err: ReadError = CompileError::MissingDatabase.into();
        assert_eq!(err.to_string(), "compile error: missing database");

        let err: ReadError = MaterializeError::Cancelled.into();
        assert!(err.is_cancelled());

        let err: ReadError = TransportError::Closed.into();
        assert!(!err.is_cancelled());
    }
}
