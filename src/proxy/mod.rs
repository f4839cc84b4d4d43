//! HTTP relay module.
//!
//! Accepts browser chat requests, normalizes the history, routes it to a
//! text or vision model, and returns the reply either as one JSON body or
//! as a paced SSE stream.

pub mod fallback;
mod handlers;
pub mod normalize;
mod server;
pub mod stream;
pub mod types;
pub mod upstream;

pub use normalize::{normalize, Conversation};
pub use server::{create_router, run_server, AppState, MAX_BODY_BYTES};
pub use stream::{chunk_text, relay, Pacing, RelayEvent, RelayOutcome};
pub use types::{ChatMessage, ChatReply, ChatRequest, ContentPart, MessageContent, Role};
pub use upstream::UpstreamClient;
