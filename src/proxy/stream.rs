//! Simulated SSE streaming.
//!
//! The relay awaits a complete upstream reply, then replays it to the browser
//! as fixed-size `delta` events with a pause between them. Events for one
//! response follow the grammar `status`, `delta`*, then exactly one of
//! `done` or `error`.
//!
//! Events travel through an `mpsc` channel whose receiver backs the HTTP
//! body. When the client disconnects the receiver is dropped, every pending
//! send or pause observes the closed channel, and the relay stops.

use std::future::Future;
use std::time::Duration;

use axum::response::sse::Event;
use serde_json::json;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Stage reported by the initial `status` event.
pub const STAGE_CALLING_MODEL: &str = "calling_model";

/// One event of the relayed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Status { stage: &'static str },
    Delta { text: String },
    Done,
    Error { message: String },
}

impl RelayEvent {
    /// SSE `event:` name.
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::Status { .. } => "status",
            RelayEvent::Delta { .. } => "delta",
            RelayEvent::Done => "done",
            RelayEvent::Error { .. } => "error",
        }
    }

    /// JSON payload of the SSE `data:` line.
    pub fn data(&self) -> serde_json::Value {
        match self {
            RelayEvent::Status { stage } => json!({ "stage": stage }),
            RelayEvent::Delta { text } => json!({ "text": text }),
            RelayEvent::Done => json!({ "ok": true }),
            RelayEvent::Error { message } => json!({ "message": message }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayEvent::Done | RelayEvent::Error { .. })
    }

    pub fn into_sse(self) -> Event {
        Event::default().event(self.name()).data(self.data().to_string())
    }
}

/// How the relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// `done` was delivered after `chunks` deltas.
    Completed { chunks: usize },
    /// `error` was delivered (or the client left while it was being sent).
    Failed,
    /// The client went away before a terminal event was delivered.
    Disconnected,
}

/// Pacing of the delta events.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Characters per delta; zero is treated as one.
    pub chunk_chars: usize,
    /// Pause between consecutive deltas.
    pub delay: Duration,
    /// Upper bound on waiting for the complete upstream reply.
    pub deadline: Duration,
}

impl From<&crate::config::RelayConfig> for Pacing {
    fn from(relay: &crate::config::RelayConfig) -> Self {
        Self {
            chunk_chars: relay.chunk_chars,
            delay: relay.chunk_delay(),
            deadline: relay.max_duration(),
        }
    }
}

/// Split `text` into slices of at most `size` characters.
///
/// Boundaries fall on character counts, never inside a UTF-8 sequence; the
/// concatenation of the slices is always `text`.
pub fn chunk_text(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Drive `completion` and relay its result into `tx`.
///
/// `on_timeout` builds the error reported when `completion` outlives
/// `pacing.deadline`.
pub async fn relay<F>(
    completion: F,
    tx: mpsc::Sender<RelayEvent>,
    pacing: Pacing,
    on_timeout: impl FnOnce() -> Error,
) -> RelayOutcome
where
    F: Future<Output = Result<String>>,
{
    if tx
        .send(RelayEvent::Status {
            stage: STAGE_CALLING_MODEL,
        })
        .await
        .is_err()
    {
        return RelayOutcome::Disconnected;
    }

    // Dropping `completion` on disconnect cancels the in-flight upstream call.
    let result = tokio::select! {
        _ = tx.closed() => {
            tracing::debug!("Client disconnected while waiting for upstream");
            return RelayOutcome::Disconnected;
        }
        result = tokio::time::timeout(pacing.deadline, completion) => {
            result.unwrap_or_else(|_| Err(on_timeout()))
        }
    };

    let text = match result {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "Relaying error event");
            let _ = tx
                .send(RelayEvent::Error {
                    message: err.to_string(),
                })
                .await;
            return RelayOutcome::Failed;
        }
    };

    let chunks = chunk_text(&text, pacing.chunk_chars);
    let total = chunks.len();
    for (index, chunk) in chunks.into_iter().enumerate() {
        if index > 0 && !pacing.delay.is_zero() {
            tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!(sent = index, total, "Client disconnected mid-stream");
                    return RelayOutcome::Disconnected;
                }
                _ = tokio::time::sleep(pacing.delay) => {}
            }
        }

        let delta = RelayEvent::Delta {
            text: chunk.to_string(),
        };
        if tx.send(delta).await.is_err() {
            tracing::debug!(sent = index, total, "Client disconnected mid-stream");
            return RelayOutcome::Disconnected;
        }
    }

    if tx.send(RelayEvent::Done).await.is_err() {
        return RelayOutcome::Disconnected;
    }
    RelayOutcome::Completed { chunks: total }
}
