//! Storage engine interfaces
//!
//! This module provides what the read path consumes from a storage engine:
//!
//! - **store**: `Store` and `ResultSet` traits
//! - **cursor**: typed batch cursors (`Cursor`, `ArrayCursor`, `Batch`)
//! - **types**: tag sets and result-set entries
//! - **eval**: predicate evaluation against tag sets
//! - **memory**: in-memory reference engine
//! - **error**: Error types
//!
//! # Read Path
//!
//! ```text
//! ReadRequest → Store::read_filter → ResultSet → (Tags, Cursor) → Batch → Batch → (empty)
//! ```
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use rawread::query::compile;
//! use rawread::storage::{MemoryStore, Points, Store, StoredSeries};
//!
//! let store = MemoryStore::default();
//! store
//!     .write_series("telegraf", "", StoredSeries::new("cpu", "usage", Points::Float(vec![(1, 0.5)])))
//!     .unwrap();
//!
//! let request = compile("telegraf", "", "cpu", "usage", "", Utc::now()).unwrap();
//! let mut rs = store.read_filter(&request).unwrap().unwrap();
//! assert!(rs.next_series().is_some());
//! rs.close();
//! ```

pub mod cursor;
pub mod error;
pub mod eval;
pub mod memory;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use cursor::{ArrayCursor, Batch, Cursor, CursorKind, VecCursor};
pub use error::{StorageError, StorageResult};
pub use eval::PredicateMatcher;
pub use memory::{
    MemoryResultSet, MemoryStore, MemoryStoreConfig, Points, SeedFile, SeedSeries, StoredSeries,
};
pub use store::{ResultSet, Store};
pub use types::{SeriesEntry, Tag, Tags};
