//! Raw read service
//!
//! Compile the filter, run it against the store and drain the result set.
//! The result set is closed on every exit path.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::query::compile;
use crate::read::stream::{self, SeriesSink, StreamStats};
use crate::read::{buffered, Limits, MaterializeError, ReadError};
use crate::remote::{FilterRequest, ReadResponse};
use crate::storage::{ResultSet, Store};

/// Executes raw reads against a store
#[derive(Clone)]
pub struct RawReader {
    store: Arc<dyn Store>,
}

impl RawReader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Buffered read: the whole response at once
    pub fn read(
        &self,
        filter: &FilterRequest,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ReadResponse, ReadError> {
        log_request("buffered", filter);

        let result = self.execute(filter, now, cancel).and_then(|mut rs| {
            let drained = buffered::drain(as_result_set(&mut rs), Limits::from(filter), cancel);
            close(rs);
            drained
        });

        match &result {
            Ok(resp) => debug!(
                db = %filter.db,
                measurement = %filter.measurement,
                series = resp.timeseries().len(),
                points = resp.sample_count(),
                "Raw read complete"
            ),
            Err(e) => log_failure("buffered", filter, e),
        }
        result
    }

    /// Streaming read: each series goes to `sink` as soon as it is complete
    pub fn read_stream<S: SeriesSink + ?Sized>(
        &self,
        filter: &FilterRequest,
        now: DateTime<Utc>,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<StreamStats, ReadError> {
        log_request("stream", filter);

        let result = self.execute(filter, now, cancel).and_then(|mut rs| {
            let streamed = stream::stream(as_result_set(&mut rs), Limits::from(filter), sink, cancel);
            close(rs);
            streamed
        });

        match &result {
            Ok(stats) => debug!(
                db = %filter.db,
                measurement = %filter.measurement,
                series = stats.series,
                points = stats.points,
                "Raw stream complete"
            ),
            Err(e) => log_failure("stream", filter, e),
        }
        result
    }

    fn execute(
        &self,
        filter: &FilterRequest,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Option<Box<dyn ResultSet>>, ReadError> {
        let request = compile(
            &filter.db,
            &filter.rp,
            &filter.measurement,
            &filter.field,
            &filter.where_clause,
            now,
        )?;
        debug!(
            start = request.range.start,
            end = request.range.end,
            predicate = %request
                .predicate
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_default(),
            "Compiled raw read"
        );

        if cancel.is_cancelled() {
            return Err(MaterializeError::Cancelled.into());
        }
        Ok(self.store.read_filter(&request)?)
    }
}

fn as_result_set(rs: &mut Option<Box<dyn ResultSet>>) -> Option<&mut dyn ResultSet> {
    match rs {
        Some(rs) => Some(rs.as_mut()),
        None => None,
    }
}

fn close(rs: Option<Box<dyn ResultSet>>) {
    if let Some(mut rs) = rs {
        rs.close();
    }
}

fn log_request(transport: &str, filter: &FilterRequest) {
    debug!(
        transport,
        db = %filter.db,
        rp = %filter.rp,
        measurement = %filter.measurement,
        field = %filter.field,
        filter = %filter.where_clause,
        slimit = filter.slimit,
        limit = filter.limit,
        "Raw read request"
    );
}

fn log_failure(transport: &str, filter: &FilterRequest, error: &ReadError) {
    if error.is_cancelled() {
        debug!(transport, db = %filter.db, "Raw read cancelled");
    } else {
        warn!(
            transport,
            db = %filter.db,
            measurement = %filter.measurement,
            error = %error,
            "Raw read failed"
        );
    }
}
