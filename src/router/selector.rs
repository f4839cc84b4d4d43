//! Model selection logic.

use crate::config::ProviderConfig;
use crate::proxy::normalize::Conversation;

/// Static text/vision model policy.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    text_model: String,
    /// Ordered vision candidates; the first is the preferred vision model.
    vision_models: Vec<String>,
}

impl ModelRouter {
    /// Create a router from a text model and ordered vision candidates.
    ///
    /// An empty candidate list falls back to the text model so that
    /// [`ModelRouter::candidates`] is never empty.
    pub fn new(text_model: impl Into<String>, vision_models: Vec<String>) -> Self {
        let text_model = text_model.into();
        let vision_models = if vision_models.is_empty() {
            vec![text_model.clone()]
        } else {
            vision_models
        };
        Self {
            text_model,
            vision_models,
        }
    }

    pub fn from_config(provider: &ProviderConfig) -> Self {
        Self::new(
            provider.text_model.clone(),
            provider.vision_fallbacks.clone(),
        )
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    pub fn vision_model(&self) -> &str {
        &self.vision_models[0]
    }

    pub fn vision_fallbacks(&self) -> &[String] {
        &self.vision_models
    }

    /// The model a conversation is routed to first.
    pub fn select_model(&self, conversation: &Conversation) -> &str {
        if conversation.wants_vision() {
            self.vision_model()
        } else {
            self.text_model()
        }
    }

    /// Every model to try for a conversation, in order.
    ///
    /// Text conversations get exactly one candidate; vision conversations
    /// get the full fallback list.
    pub fn candidates(&self, conversation: &Conversation) -> Vec<&str> {
        if conversation.wants_vision() {
            self.vision_models.iter().map(String::as_str).collect()
        } else {
            vec![self.text_model.as_str()]
        }
    }
}
