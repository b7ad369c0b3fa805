//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::read::ReadError;
use crate::remote::CodecError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Compile, storage or materialize failure of a raw read
    #[error("{0}")]
    Read(#[from] ReadError),

    /// Response encoding failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The read did not finish within the request timeout
    #[error("Read timed out after {0}s")]
    Timeout(u64),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable (store not answering)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Read(ReadError::Compile(e)) if e.is_validation() => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            ApiError::Read(ReadError::Compile(_)) => (StatusCode::BAD_REQUEST, "COMPILE_ERROR"),
            ApiError::Read(ReadError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
            }
            ApiError::Read(ReadError::Materialize(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "MATERIALIZE_ERROR")
            }
            ApiError::Read(ReadError::Transport(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "TRANSPORT_ERROR")
            }
            ApiError::Codec(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CODEC_ERROR"),
            ApiError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CompileError;
    use crate::read::MaterializeError;
    use crate::storage::{CursorKind, StorageError, Tags};

    #[test]
    fn test_read_errors_map_by_stage() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (
                ReadError::from(CompileError::MissingDatabase).into(),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                ReadError::from(CompileError::Parse("bad".into())).into(),
                StatusCode::BAD_REQUEST,
                "COMPILE_ERROR",
            ),
            (
                ReadError::from(StorageError::DatabaseNotFound("db".into())).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
            ),
            (
                ReadError::from(MaterializeError::UnsupportedCursor {
                    kind: CursorKind::String,
                    series: Tags::default(),
                })
                .into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "MATERIALIZE_ERROR",
            ),
            (ApiError::Timeout(5), StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{err}");
        }
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = ApiError::ServiceUnavailable("store down".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "SERVICE_UNAVAILABLE");
        assert_eq!(body.error.message, "Service unavailable: store down");
        assert!(uuid::Uuid::parse_str(&body.request_id).is_ok());
    }
}
