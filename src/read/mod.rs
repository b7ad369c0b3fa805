//! Result materializer
//!
//! Drains a result set into remote-read series:
//!
//! - **buffered**: the whole response at once, `limit` checked between series
//! - **stream**: one series at a time into a [`SeriesSink`], `limit` checked
//!   after every sample
//! - **reader**: [`RawReader`], compile, execute and drain in one call
//!
//! Float cursors are copied, integer cursors widen to float, other kinds fail
//! the read. Timestamps go from nanoseconds to milliseconds by integer
//! division. Every cursor handed out by the result set is closed exactly once.

pub mod buffered;
mod error;
pub mod reader;
pub mod stream;

use tokio_util::sync::CancellationToken;

use crate::remote::{FilterRequest, Sample, TimeSeries};
use crate::storage::{ArrayCursor, Cursor, Tags};

pub use error::{MaterializeError, ReadError, TransportError};
pub use reader::RawReader;
pub use stream::{ChannelSink, SeriesSink, StreamStats};

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Series and sample caps, `None` meaning unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    pub slimit: Option<usize>,
    pub limit: Option<usize>,
}

impl Limits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Wire form: zero or negative means unlimited
    pub fn from_wire(slimit: i64, limit: i64) -> Self {
        fn positive(v: i64) -> Option<usize> {
            (v > 0).then(|| usize::try_from(v).unwrap_or(usize::MAX))
        }
        Self {
            slimit: positive(slimit),
            limit: positive(limit),
        }
    }

    pub(crate) fn series_reached(&self, series: usize) -> bool {
        self.slimit.map_or(false, |max| series >= max)
    }

    pub(crate) fn points_reached(&self, points: usize) -> bool {
        self.limit.map_or(false, |max| points >= max)
    }
}

impl From<&FilterRequest> for Limits {
    fn from(req: &FilterRequest) -> Self {
        Limits::from_wire(req.slimit, req.limit)
    }
}

/// Read every batch of `cursor` into samples, stopping after `budget` samples
/// when set. Labels for errors come from `tags`.
pub(crate) fn drain_cursor(
    cursor: &mut Cursor,
    tags: &Tags,
    budget: Option<usize>,
    cancel: &CancellationToken,
) -> Result<Vec<Sample>, MaterializeError> {
    match cursor {
        Cursor::Float(c) => drain_array(c.as_mut(), |v| v, budget, cancel),
        Cursor::Integer(c) => drain_array(c.as_mut(), |v| v as f64, budget, cancel),
        other => Err(MaterializeError::UnsupportedCursor {
            kind: other.kind(),
            series: tags.clone(),
        }),
    }
}

fn drain_array<T>(
    cursor: &mut dyn ArrayCursor<T>,
    to_float: impl Fn(T) -> f64,
    budget: Option<usize>,
    cancel: &CancellationToken,
) -> Result<Vec<Sample>, MaterializeError> {
    let mut samples = Vec::new();
    loop {
        if cancel.is_cancelled() {
            return Err(MaterializeError::Cancelled);
        }
        let batch = cursor.next_batch();
        if batch.is_empty() {
            return Ok(samples);
        }
        for (ts, value) in batch.timestamps.into_iter().zip(batch.values) {
            samples.push(Sample {
                value: to_float(value),
                timestamp_ms: ts / NANOS_PER_MILLI,
            });
            if budget.map_or(false, |max| samples.len() >= max) {
                return Ok(samples);
            }
        }
    }
}

/// Assemble a series from labels and samples
pub(crate) fn series(tags: &Tags, samples: Vec<Sample>) -> TimeSeries {
    let mut series = TimeSeries::with_labels(tags);
    series.samples = samples;
    series
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::VecCursor;

    #[test]
    fn test_limits_from_wire() {
        assert_eq!(Limits::from_wire(0, -5), Limits::unlimited());
        assert_eq!(
            Limits::from_wire(2, 10),
            Limits {
                slimit: Some(2),
                limit: Some(10)
            }
        );
        let limits = Limits::from_wire(1, 0);
        assert!(limits.series_reached(1));
        assert!(!limits.series_reached(0));
        assert!(!limits.points_reached(usize::MAX));
    }

    #[test]
    fn test_drain_converts_timestamps_and_integers() {
        let mut cursor = Cursor::Integer(Box::new(VecCursor::from_points(
            vec![(1_999_999, 7), (3_000_000, -2)],
            1,
        )));
        let samples = drain_cursor(&mut cursor, &Tags::default(), None, &CancellationToken::new()).unwrap();
        assert_eq!(
            samples,
            vec![
                Sample { value: 7.0, timestamp_ms: 1 },
                Sample { value: -2.0, timestamp_ms: 3 },
            ]
        );
    }

    #[test]
    fn test_drain_budget_stops_mid_batch() {
        let mut cursor = Cursor::Float(Box::new(VecCursor::from_points(
            (0..10).map(|i| (i, i as f64)).collect(),
            100,
        )));
        let samples = drain_cursor(&mut cursor, &Tags::default(), Some(4), &CancellationToken::new()).unwrap();
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn test_drain_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut cursor = Cursor::Float(Box::new(VecCursor::from_points(vec![(1, 1.0)], 1)));
        let err = drain_cursor(&mut cursor, &Tags::default(), None, &cancel).unwrap_err();
        assert_eq!(err, MaterializeError::Cancelled);
    }
}
