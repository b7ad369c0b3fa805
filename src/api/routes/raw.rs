//! Raw Read Routes
//!
//! - GET /api/v1/raw - Parameters in the query string
//! - POST /api/v1/raw - Parameters in a form body
//!
//! The whole response is built before it is sent. `Accept:
//! application/x-protobuf` selects protobuf, anything else JSON;
//! `Accept-Encoding: lz4` compresses the body as an LZ4 frame.

use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::api::dto::RawParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::remote::{compress, encode_response, Compression, FilterRequest, Format};

/// GET /api/v1/raw
pub async fn raw_get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<RawParams>,
) -> ApiResult<Response> {
    raw_read(state, &headers, params.into_filter()).await
}

/// POST /api/v1/raw
pub async fn raw_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<RawParams>,
) -> ApiResult<Response> {
    raw_read(state, &headers, params.into_filter()).await
}

async fn raw_read(
    state: Arc<AppState>,
    headers: &HeaderMap,
    filter: FilterRequest,
) -> ApiResult<Response> {
    let format = Format::from_accept(header_str(headers, header::ACCEPT));
    let compression = Compression::from_accept_encoding(header_str(headers, header::ACCEPT_ENCODING));

    let cancel = CancellationToken::new();
    // cancels the drain if this future is dropped before it completes
    let _guard = cancel.clone().drop_guard();

    let reader = state.reader.clone();
    let task_cancel = cancel.clone();
    let task = tokio::task::spawn_blocking(move || -> ApiResult<Vec<u8>> {
        let response = reader.read(&filter, Utc::now(), &task_cancel)?;
        let body = encode_response(&response, format)?;
        Ok(compress(&body, compression)?)
    });

    let timeout = state.request_timeout();
    let body = match tokio::time::timeout(timeout, task).await {
        Ok(joined) => {
            joined.map_err(|e| ApiError::Internal(format!("read task failed: {}", e)))??
        }
        Err(_) => {
            cancel.cancel();
            return Err(ApiError::Timeout(timeout.as_secs()));
        }
    };

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, format.content_type())],
        body,
    )
        .into_response();
    if let Some(encoding) = compression.content_encoding() {
        response
            .headers_mut()
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding));
    }
    Ok(response)
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
