//! Upstream completion client.
//!
//! Issues one non-streaming completion request per call and maps every
//! failure (HTTP status, transport, malformed or blank body) into [`Error`].

use axum::http::header;
use reqwest::Client;

use super::normalize::Conversation;
use super::types::{
    CompletionRequest, CompletionResponse, Generation, GenerationParameters, GenerationRequest,
};
use crate::config::{ApiKey, ProviderConfig, ProviderKind};
use crate::error::{Error, Result};

/// Marker separating the prompt from the reply in flattened prompts.
const ASSISTANT_MARKER: &str = "ASSISTANT:";

/// JSON pointers tried, in order, for a human-readable upstream error.
const ERROR_MESSAGE_POINTERS: [&str; 4] = ["/error/message", "/message", "/detail", "/error"];

/// Pull a readable message out of an upstream error body.
///
/// Falls back to the raw body when it is not JSON or none of the
/// candidate fields holds a non-empty string.
pub fn extract_error_message(raw_body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw_body)
        .ok()
        .and_then(|json| {
            ERROR_MESSAGE_POINTERS.iter().find_map(|pointer| {
                json.pointer(pointer)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| raw_body.to_string())
}

/// Flatten a conversation into a single `ROLE: content` prompt.
pub fn flatten_prompt(conversation: &Conversation) -> String {
    let mut prompt = conversation
        .messages()
        .iter()
        .map(|m| {
            format!(
                "{}: {}",
                m.role.as_str().to_uppercase(),
                m.content.flatten_text()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    prompt.push('\n');
    prompt.push_str(ASSISTANT_MARKER);
    prompt
}

/// Keep only the text after the last assistant marker.
fn strip_prompt_echo(generated: &str) -> &str {
    generated
        .rsplit(ASSISTANT_MARKER)
        .next()
        .unwrap_or(generated)
        .trim()
}

/// Client for the configured completion provider.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    provider: ProviderConfig,
}

impl UpstreamClient {
    pub fn new(http: Client, provider: ProviderConfig) -> Self {
        Self { http, provider }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind
    }

    /// Fail fast when no credential is configured.
    pub fn api_key(&self) -> Result<&ApiKey> {
        self.provider.api_key.as_ref().ok_or(Error::MissingApiKey {
            var: self.provider.kind.api_key_var(),
        })
    }

    /// Request a full completion from `model` and return the trimmed reply.
    pub async fn complete(&self, model: &str, conversation: &Conversation) -> Result<String> {
        let api_key = self.api_key()?;
        let text = match self.provider.kind {
            ProviderKind::Groq => self.complete_chat(api_key, model, conversation).await?,
            ProviderKind::HuggingFace => {
                self.complete_generation(api_key, model, conversation)
                    .await?
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyResponse {
                provider: self.provider.kind,
            });
        }
        Ok(text.to_string())
    }

    /// OpenAI-compatible chat-completions call.
    async fn complete_chat(
        &self,
        api_key: &ApiKey,
        model: &str,
        conversation: &Conversation,
    ) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.provider.base_url.trim_end_matches('/')
        );
        let body = CompletionRequest {
            model,
            messages: conversation.messages(),
            temperature: self.provider.temperature,
            max_tokens: self.provider.max_tokens,
            stream: false,
        };

        let raw = self.post(&url, api_key, &body).await?;
        let parsed: CompletionResponse = serde_json::from_str(&raw).map_err(|e| {
            Error::MalformedResponse {
                provider: self.provider.kind,
                reason: e.to_string(),
            }
        })?;

        Ok(parsed.first_content().unwrap_or_default().to_string())
    }

    /// Hugging Face text-generation call on a flattened prompt.
    async fn complete_generation(
        &self,
        api_key: &ApiKey,
        model: &str,
        conversation: &Conversation,
    ) -> Result<String> {
        let url = format!("{}/{}", self.provider.base_url.trim_end_matches('/'), model);
        let prompt = flatten_prompt(conversation);
        let body = GenerationRequest {
            inputs: &prompt,
            parameters: GenerationParameters {
                max_new_tokens: self.provider.max_tokens,
                temperature: self.provider.temperature,
            },
        };

        let raw = self.post(&url, api_key, &body).await?;
        let generations: Vec<Generation> = serde_json::from_str(&raw).map_err(|e| {
            Error::MalformedResponse {
                provider: self.provider.kind,
                reason: e.to_string(),
            }
        })?;

        let generated = generations
            .first()
            .and_then(|g| g.generated_text.as_deref())
            .unwrap_or_default();
        Ok(strip_prompt_echo(generated).to_string())
    }

    /// POST a JSON body and return the raw success body.
    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        api_key: &ApiKey,
        body: &B,
    ) -> Result<String> {
        let kind = self.provider.kind;

        let response = self
            .http
            .post(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose_secret()),
            )
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, provider = %kind, "Failed to reach provider");
                Error::Transport {
                    provider: kind,
                    source: e,
                }
            })?;

        let status = response.status();
        let raw = response.text().await.map_err(|e| Error::Transport {
            provider: kind,
            source: e,
        })?;

        if !status.is_success() {
            let message = extract_error_message(&raw);
            tracing::warn!(
                status = %status,
                provider = %kind,
                message = %message,
                "Provider returned error"
            );
            return Err(Error::Upstream {
                provider: kind,
                status: status.as_u16(),
                message,
                raw_body: raw,
            });
        }

        Ok(raw)
    }
}
