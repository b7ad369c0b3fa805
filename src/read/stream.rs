//! Streaming drain
//!
//! Sends each series to a [`SeriesSink`] as soon as it is complete. `limit`
//! counts samples across the whole call and is enforced after every sample;
//! the series that reaches it is cut short and still sent. A blocking sink is
//! the only backpressure: draining pauses until the send returns.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::read::{drain_cursor, series, Limits, MaterializeError, ReadError, TransportError};
use crate::remote::TimeSeries;
use crate::storage::{ResultSet, SeriesEntry};

/// Destination of streamed series
pub trait SeriesSink {
    fn send(&mut self, series: TimeSeries) -> Result<(), TransportError>;
}

impl SeriesSink for Vec<TimeSeries> {
    fn send(&mut self, series: TimeSeries) -> Result<(), TransportError> {
        self.push(series);
        Ok(())
    }
}

/// Sink feeding a bounded channel from a blocking thread
///
/// Must not be used from inside an async context; `blocking_send` panics there.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TimeSeries>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<TimeSeries>) -> Self {
        Self { tx }
    }
}

impl SeriesSink for ChannelSink {
    fn send(&mut self, series: TimeSeries) -> Result<(), TransportError> {
        self.tx
            .blocking_send(series)
            .map_err(|_| TransportError::Closed)
    }
}

/// Counts of what a streaming drain delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub series: usize,
    pub points: usize,
}

/// Stream `result_set` into `sink`. Series already sent stay delivered when a
/// later one fails. Does not close the result set itself.
pub fn stream<S: SeriesSink + ?Sized>(
    result_set: Option<&mut dyn ResultSet>,
    limits: Limits,
    sink: &mut S,
    cancel: &CancellationToken,
) -> Result<StreamStats, ReadError> {
    let mut stats = StreamStats::default();
    let Some(rs) = result_set else {
        return Ok(stats);
    };

    loop {
        if limits.series_reached(stats.series) || limits.points_reached(stats.points) {
            break;
        }
        if cancel.is_cancelled() {
            return Err(MaterializeError::Cancelled.into());
        }
        let Some(SeriesEntry { tags, cursor }) = rs.next_series() else {
            break;
        };
        let Some(mut cursor) = cursor else {
            continue;
        };

        let tags = tags.without_system_tags();
        let budget = limits.limit.map(|max| max - stats.points);
        let drained = drain_cursor(&mut cursor, &tags, budget, cancel);
        cursor.close();
        let samples = drained?;

        if samples.is_empty() {
            continue;
        }
        stats.series += 1;
        stats.points += samples.len();
        sink.send(series(&tags, samples))?;
    }

    Ok(stats)
}
