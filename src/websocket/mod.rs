//! WebSocket Raw Streaming
//!
//! Streams a raw read one series per frame.
//!
//! ## Protocol
//!
//! 1. client connects to `/api/v1/raw/stream`
//! 2. client sends the filter: a JSON text frame or a protobuf binary frame
//! 3. server sends one frame per completed series, in the same format
//! 4. server closes with 1000 on success, 1011 with the error text on a
//!    failed read, or 1007 if the filter could not be decoded
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8086/api/v1/raw/stream');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({db: 'telegraf', measurement: 'cpu', field: 'usage', limit: 100}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const series = JSON.parse(event.data);
//!   console.log(series.labels, series.samples.length);
//! };
//! ```

mod handler;
mod messages;

pub use handler::raw_stream_handler;
pub use messages::{series_frame, FirstFrame};
