//! Engine interfaces consumed by the read path
//!
//! Calls are synchronous; async callers run them on the blocking pool.

use crate::query::ReadRequest;
use crate::storage::error::StorageResult;
use crate::storage::types::SeriesEntry;

/// A storage engine that can execute filtered raw reads
pub trait Store: Send + Sync {
    /// Execute `request`. `None` is a valid "no data" answer.
    fn read_filter(&self, request: &ReadRequest) -> StorageResult<Option<Box<dyn ResultSet>>>;

    /// Cheap liveness check used by readiness
    fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Lazy sequence of series matching a read
pub trait ResultSet: Send {
    /// Next matching series in engine order
    fn next_series(&mut self) -> Option<SeriesEntry>;

    /// Release the result set and anything it still holds
    fn close(&mut self);
}
