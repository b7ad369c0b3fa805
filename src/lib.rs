//! # rawread
//!
//! Raw read adapter for a time-series store. A filter request (database,
//! measurement, field, `where` expression, limits) is compiled into a time
//! range and a predicate tree, executed against a [`storage::Store`], and the
//! matching series come back in the remote-read format, either as one
//! buffered response or one series at a time.
//!
//! ## Modules
//!
//! - [`query`]: `where` expression parser and predicate compiler
//! - [`storage`]: store, result set and cursor interfaces plus an in-memory store
//! - [`read`]: buffered and streaming materializers, [`RawReader`]
//! - [`remote`]: remote-read wire messages and codecs
//! - [`api`]: HTTP API with Axum
//! - [`websocket`]: streaming endpoint
//! - [`config`]: configuration file and environment overrides
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use rawread::{FilterRequest, MemoryStore, Points, RawReader, StoredSeries};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let store = MemoryStore::default();
//! store
//!     .write_series(
//!         "telegraf",
//!         "",
//!         StoredSeries::new("cpu", "usage", Points::Float(vec![(1_000_000, 0.5)]))
//!             .tag("host", "a"),
//!     )
//!     .unwrap();
//!
//! let reader = RawReader::new(Arc::new(store));
//! let filter = FilterRequest::new("telegraf", "cpu").field("usage").filter("host = 'a'");
//! let response = reader.read(&filter, Utc::now(), &CancellationToken::new()).unwrap();
//!
//! assert_eq!(response.timeseries().len(), 1);
//! assert_eq!(response.timeseries()[0].samples[0].timestamp_ms, 1);
//! ```

pub mod api;
pub mod config;
pub mod query;
pub mod read;
pub mod remote;
pub mod storage;
pub mod websocket;

// Re-export top-level types for convenience
pub use query::{compile, CompileError, Predicate, ReadRequest};

pub use storage::{
    MemoryStore, MemoryStoreConfig, Points, ResultSet, StorageError, StorageResult, Store,
    StoredSeries,
};

pub use read::{Limits, MaterializeError, RawReader, ReadError, SeriesSink, StreamStats};

pub use remote::{FilterRequest, ReadResponse, TimeSeries};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError};

pub use websocket::raw_stream_handler;
