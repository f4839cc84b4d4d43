//! Chat message types and the upstream wire formats.
//!
//! Inbound messages arrive as loosely-typed JSON. The `from_value`
//! constructors here are total: each returns a fully valid value or `None`,
//! never a partially-filled one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Image reference inside a multimodal message (data URL or remote URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    /// Recognize `{type: "text", text}` or `{type: "image_url", image_url: {url}}`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.get("type")?.as_str()? {
            "text" => {
                let text = value.get("text")?.as_str()?;
                Some(ContentPart::Text {
                    text: text.to_string(),
                })
            }
            "image_url" => {
                let url = value.get("image_url")?.get("url")?.as_str()?;
                if url.is_empty() {
                    return None;
                }
                Some(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: url.to_string(),
                    },
                })
            }
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentPart::ImageUrl { .. })
    }
}

/// Message content: plain text or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn has_image(&self) -> bool {
        match self {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts.iter().any(ContentPart::is_image),
        }
    }

    /// Text-only rendering; image parts are omitted and text parts joined by spaces.
    pub fn flatten_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// A validated chat message, serialized in OpenAI chat-completions shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Accept a message only if its role is recognized and some content survives.
    ///
    /// String content passes through unchanged. Part lists keep recognized
    /// parts only and are rejected when none remain.
    pub fn from_value(value: &Value) -> Option<Self> {
        let role = Role::parse(value.get("role")?.as_str()?)?;
        let content = match value.get("content")? {
            Value::String(text) => MessageContent::Text(text.clone()),
            Value::Array(items) => {
                let parts: Vec<ContentPart> =
                    items.iter().filter_map(ContentPart::from_value).collect();
                if parts.is_empty() {
                    return None;
                }
                MessageContent::Parts(parts)
            }
            _ => return None,
        };
        Some(Self { role, content })
    }
}

/// Inbound body of `/api/chat` and `/api/chat/stream`.
///
/// Only `messages` is read; anything it holds is validated by the normalizer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Value,
}

impl ChatRequest {
    /// Parse a request body leniently; unreadable bodies become an empty history.
    pub fn from_body(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable chat request body, using empty history");
                Self::default()
            }
        }
    }

    /// Raw message entries; non-array `messages` yields an empty slice.
    pub fn raw_messages(&self) -> &[Value] {
        self.messages.as_array().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Successful body of `/api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
}

/// Chat-completions request sent to an OpenAI-compatible provider.
#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Chat-completions response; only the first choice's content is used.
#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()?
            .message
            .as_ref()?
            .content
            .as_deref()
    }
}

/// Text-generation request for the Hugging Face inference API.
#[derive(Debug, Serialize)]
pub struct GenerationRequest<'a> {
    pub inputs: &'a str,
    pub parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
pub struct GenerationParameters {
    pub max_new_tokens: u32,
    pub temperature: f32,
}

/// One element of the Hugging Face `[{generated_text}]` response.
#[derive(Debug, Deserialize)]
pub struct Generation {
    #[serde(default)]
    pub generated_text: Option<String>,
}
