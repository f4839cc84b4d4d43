//! HTTP request handlers.

use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{sse::Sse, IntoResponse},
    Json,
};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;
use uuid::Uuid;

use super::fallback::first_success;
use super::normalize::normalize;
use super::server::AppState;
use super::stream::{relay, Pacing, RelayEvent, RelayOutcome};
use super::types::{ChatReply, ChatRequest};
use crate::error::{Error, Result};

/// Buffered events between the relay task and the response body.
const RELAY_CHANNEL_CAPACITY: usize = 16;

/// Normalize, route, and complete a chat history.
///
/// Text conversations make a single attempt; vision conversations walk the
/// configured fallback list.
async fn generate(state: &AppState, raw_messages: &[Value]) -> Result<String> {
    let conversation = normalize(raw_messages);
    state.upstream.api_key()?;

    let candidates = state.router.candidates(&conversation);
    tracing::info!(
        model = state.router.select_model(&conversation),
        vision = conversation.wants_vision(),
        messages = conversation.len(),
        candidates = candidates.len(),
        "Selected model"
    );

    let upstream = &state.upstream;
    let conversation = &conversation;
    first_success(&candidates, move |model| upstream.complete(model, conversation)).await
}

/// Handle POST /api/chat
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Json<ChatReply>> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", request_id = %request_id);

    async move {
        let request = ChatRequest::from_body(&body);
        tracing::info!(
            messages = request.raw_messages().len(),
            "Received chat request"
        );

        let text = generate(&state, request.raw_messages())
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Chat request failed"))?;

        tracing::info!(chars = text.chars().count(), "Chat request completed");
        Ok(Json(ChatReply { text }))
    }
    .instrument(span)
    .await
}

/// Handle POST /api/chat/stream
///
/// The response is committed as `200 text/event-stream` immediately; failures
/// are reported in-band as an `error` event.
pub async fn chat_stream(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat_stream", request_id = %request_id);
    let request = ChatRequest::from_body(&body);
    let pacing = Pacing::from(&state.config.relay);
    let kind = state.upstream.kind();
    let deadline_secs = state.config.relay.max_duration_secs;

    let (tx, rx) = mpsc::channel::<RelayEvent>(RELAY_CHANNEL_CAPACITY);

    tokio::spawn(
        async move {
            tracing::info!(
                messages = request.raw_messages().len(),
                "Received streaming chat request"
            );
            let completion = generate(&state, request.raw_messages());
            let on_timeout = move || Error::Timeout {
                provider: kind,
                secs: deadline_secs,
            };
            match relay(completion, tx, pacing, on_timeout).await {
                RelayOutcome::Completed { chunks } => {
                    tracing::info!(chunks, "Stream completed")
                }
                RelayOutcome::Failed => tracing::info!("Stream ended with error event"),
                RelayOutcome::Disconnected => tracing::info!("Client disconnected"),
            }
        }
        .instrument(span),
    );

    let events = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(event.into_sse()));
    ([(header::CONNECTION, "keep-alive")], Sse::new(events))
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "provider": state.upstream.kind().id(),
        "textModel": state.router.text_model(),
        "visionModel": state.router.vision_model(),
        "visionFallbacks": state.router.vision_fallbacks(),
    }))
}

/// Handle GET /
pub async fn root() -> &'static str {
    "QuickGPT backend running"
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}
