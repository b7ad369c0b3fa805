//! WebSocket Frame Types
//!
//! How frames of the raw stream map to wire messages. The first data frame
//! carries the filter and fixes the format of every reply: a text frame is a
//! JSON `FilterRequest` answered with JSON text frames, a binary frame is a
//! protobuf `FilterRequest` answered with protobuf binary frames.

use axum::extract::ws::{close_code, CloseFrame, Message};
use std::borrow::Cow;

use crate::remote::{decode_filter, encode_series, CodecResult, FilterRequest, Format, TimeSeries};

/// Longest close reason that fits a control frame
const MAX_CLOSE_REASON: usize = 123;

/// What the first frames of a connection amount to
#[derive(Debug)]
pub enum FirstFrame {
    Filter(FilterRequest, Format),
    /// Control frame, keep waiting
    Skip,
    /// Peer closed before sending a filter
    Closed,
    /// Undecodable filter
    Invalid(String),
}

impl FirstFrame {
    pub fn from_message(message: Message) -> Self {
        let (data, format) = match &message {
            Message::Text(text) => (text.as_bytes(), Format::Json),
            Message::Binary(data) => (data.as_slice(), Format::Protobuf),
            Message::Ping(_) | Message::Pong(_) => return FirstFrame::Skip,
            Message::Close(_) => return FirstFrame::Closed,
        };
        match decode_filter(data, format) {
            Ok(filter) => FirstFrame::Filter(filter, format),
            Err(e) => FirstFrame::Invalid(format!("invalid filter: {}", e)),
        }
    }
}

/// One completed series as a data frame in `format`
pub fn series_frame(series: &TimeSeries, format: Format) -> CodecResult<Message> {
    let data = encode_series(series, format)?;
    Ok(match format {
        Format::Protobuf => Message::Binary(data),
        // serde_json only emits UTF-8
        Format::Json => Message::Text(String::from_utf8_lossy(&data).into_owned()),
    })
}

pub fn normal_close() -> Message {
    close_frame(close_code::NORMAL, "")
}

/// Stream-level failure, reason truncated to fit the frame
pub fn error_close(reason: &str) -> Message {
    close_frame(close_code::ERROR, reason)
}

pub fn invalid_close(reason: &str) -> Message {
    close_frame(close_code::INVALID, reason)
}

fn close_frame(code: u16, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Cow::Owned(truncate(reason, MAX_CLOSE_REASON).to_string()),
    }))
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
