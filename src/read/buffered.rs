//! Buffered drain
//!
//! Collects every qualifying series into one [`ReadResponse`]. `slimit` and
//! `limit` are checked before each series only, so the last series accepted
//! may carry `limit` past its cap.

use tokio_util::sync::CancellationToken;

use crate::read::{drain_cursor, series, Limits, MaterializeError, ReadError};
use crate::remote::ReadResponse;
use crate::storage::{ResultSet, SeriesEntry};

/// Drain `result_set` into a single-result response. An absent result set
/// yields one empty result. Does not close the result set itself.
pub fn drain(
    result_set: Option<&mut dyn ResultSet>,
    limits: Limits,
    cancel: &CancellationToken,
) -> Result<ReadResponse, ReadError> {
    let Some(rs) = result_set else {
        return Ok(ReadResponse::single(Vec::new()));
    };

    let mut timeseries = Vec::new();
    let mut points = 0usize;

    loop {
        if limits.series_reached(timeseries.len()) || limits.points_reached(points) {
            break;
        }
        if cancel.is_cancelled() {
            return Err(MaterializeError::Cancelled.into());
        }
        let Some(SeriesEntry { tags, cursor }) = rs.next_series() else {
            break;
        };
        // no data for this series key and field
        let Some(mut cursor) = cursor else {
            continue;
        };

        let tags = tags.without_system_tags();
        let drained = drain_cursor(&mut cursor, &tags, None, cancel);
        cursor.close();
        let samples = drained?;

        if !samples.is_empty() {
            points += samples.len();
            timeseries.push(series(&tags, samples));
        }
    }

    Ok(ReadResponse::single(timeseries))
}
