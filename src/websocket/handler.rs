//! WebSocket Handler
//!
//! Upgrades `GET /api/v1/raw/stream` and runs one streaming read per
//! connection. The drain runs on the blocking pool and hands each completed
//! series through a bounded channel; the socket side forwards them as data
//! frames and finishes with a close frame.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::messages::{error_close, invalid_close, normal_close, series_frame, FirstFrame};
use crate::api::AppState;
use crate::read::{ChannelSink, RawReader};
use crate::remote::{Format, TimeSeries};

/// WebSocket upgrade handler
pub async fn raw_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Why forwarding stopped before the drain finished
enum Interrupted {
    /// Peer closed or the socket failed
    Disconnected,
    /// A series could not be encoded
    Encode(String),
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    run_stream(sender, receiver, state.reader.clone(), state.stream_buffer()).await;
}

/// One streaming read over a message transport: filter in, series frames
/// and a close frame out
async fn run_stream<Tx, Rx, E>(mut sender: Tx, mut receiver: Rx, reader: RawReader, buffer: usize)
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: fmt::Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let (filter, format) = match read_filter(&mut receiver).await {
        FirstFrame::Filter(filter, format) => (filter, format),
        FirstFrame::Invalid(reason) => {
            tracing::debug!(reason = %reason, "Rejecting stream with bad filter");
            let _ = sender.send(invalid_close(&reason)).await;
            return;
        }
        FirstFrame::Closed | FirstFrame::Skip => return,
    };

    let (tx, mut rx) = mpsc::channel::<TimeSeries>(buffer.max(1));
    let cancel = CancellationToken::new();

    let task_cancel = cancel.clone();
    let drain = tokio::task::spawn_blocking(move || {
        let mut sink = ChannelSink::new(tx);
        reader.read_stream(&filter, Utc::now(), &mut sink, &task_cancel)
    });

    let interrupted = forward(&mut sender, &mut receiver, &mut rx, format).await;
    if interrupted.is_some() {
        cancel.cancel();
    }
    // unblocks a drain waiting on a full channel
    drop(rx);

    let close = match (drain.await, interrupted) {
        (_, Some(Interrupted::Disconnected)) => None,
        (_, Some(Interrupted::Encode(reason))) => Some(error_close(&reason)),
        (Ok(Ok(stats)), None) => {
            tracing::debug!(series = stats.series, points = stats.points, "Stream finished");
            Some(normal_close())
        }
        (Ok(Err(e)), None) => Some(error_close(&e.to_string())),
        (Err(e), None) => {
            tracing::error!(error = %e, "Stream task failed");
            Some(error_close("internal error"))
        }
    };

    if let Some(close) = close {
        if sender.send(close).await.is_err() {
            tracing::debug!("Peer gone before close frame");
        }
    }
}

/// Wait for the first data frame
async fn read_filter<Rx, E>(receiver: &mut Rx) -> FirstFrame
where
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    while let Some(result) = receiver.next().await {
        match result {
            Ok(message) => match FirstFrame::from_message(message) {
                FirstFrame::Skip => continue,
                other => return other,
            },
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket receive error");
                return FirstFrame::Closed;
            }
        }
    }
    FirstFrame::Closed
}

/// Forward series until the drain ends or the connection breaks
async fn forward<Tx, Rx, E>(
    sender: &mut Tx,
    receiver: &mut Rx,
    rx: &mut mpsc::Receiver<TimeSeries>,
    format: Format,
) -> Option<Interrupted>
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: fmt::Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
{
    loop {
        tokio::select! {
            next = rx.recv() => {
                // drain finished and dropped its sender
                let Some(series) = next else {
                    return None;
                };
                let frame = match series_frame(&series, format) {
                    Ok(frame) => frame,
                    Err(e) => return Some(Interrupted::Encode(e.to_string())),
                };
                if let Err(e) = sender.send(frame).await {
                    tracing::debug!(error = %e, "WebSocket send failed, cancelling stream");
                    return Some(Interrupted::Disconnected);
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    tracing::debug!("Client closed stream early");
                    return Some(Interrupted::Disconnected);
                }
                // further frames after the filter are ignored
                Some(Ok(_)) => {}
            }
        }
    }
}
