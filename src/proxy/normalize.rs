//! Message normalization.
//!
//! Reshapes a client-supplied chat history into the upstream schema. Never
//! fails: invalid entries are dropped and an empty result degrades to a
//! single greeting so the upstream never sees an empty message list.

use serde_json::Value;

use super::types::{ChatMessage, Role};

/// Text of the message substituted when nothing survives normalization.
pub const FALLBACK_GREETING: &str = "Hello";

/// A normalized, non-empty conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    fn fallback() -> Self {
        Self {
            messages: vec![ChatMessage::text(Role::User, FALLBACK_GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Never true: a `Conversation` holds at least one message.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True when any message carries at least one image part.
    pub fn wants_vision(&self) -> bool {
        self.messages.iter().any(|m| m.content.has_image())
    }
}

/// Normalize raw message objects, preserving order.
pub fn normalize(raw: &[Value]) -> Conversation {
    let messages: Vec<ChatMessage> = raw.iter().filter_map(ChatMessage::from_value).collect();

    let dropped = raw.len() - messages.len();
    if dropped > 0 {
        tracing::debug!(dropped, kept = messages.len(), "Dropped unusable messages");
    }

    if messages.is_empty() {
        return Conversation::fallback();
    }
    Conversation { messages }
}

impl From<Vec<ChatMessage>> for Conversation {
    fn from(messages: Vec<ChatMessage>) -> Self {
        if messages.is_empty() {
            Conversation::fallback()
        } else {
            Conversation { messages }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::types::{ContentPart, MessageContent};
    use serde_json::json;

    fn as_vec(value: Value) -> Vec<Value> {
        value.as_array().cloned().unwrap_or_default()
    }

    #[test]
    fn empty_history_yields_fallback() {
        let conv = normalize(&[]);
        assert_eq!(conv.messages(), &[ChatMessage::text(Role::User, "Hello")]);
    }

    #[test]
    fn unknown_role_is_dropped() {
        let conv = normalize(&as_vec(json!([
            {"role": "tool", "content": "result"},
            {"role": "user", "content": "hi"}
        ])));
        assert_eq!(conv.messages(), &[ChatMessage::text(Role::User, "hi")]);
    }

    #[test]
    fn only_unknown_roles_yields_fallback() {
        let conv = normalize(&as_vec(json!([{"role": "developer", "content": "x"}])));
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0], ChatMessage::text(Role::User, FALLBACK_GREETING));
    }

    #[test]
    fn missing_role_is_dropped() {
        let conv = normalize(&as_vec(json!([
            {"content": "orphan"},
            {"role": null, "content": "null role"},
            {"role": "assistant", "content": "kept"}
        ])));
        assert_eq!(conv.messages(), &[ChatMessage::text(Role::Assistant, "kept")]);
    }

    #[test]
    fn unrecognized_parts_are_filtered() {
        let conv = normalize(&as_vec(json!([{
            "role": "user",
            "content": [
                {"type": "text", "text": "describe"},
                {"type": "input_audio", "input_audio": {"data": "..."}}
            ]
        }])));
        assert_eq!(
            conv.messages()[0].content,
            MessageContent::Parts(vec![ContentPart::Text {
                text: "describe".to_string()
            }])
        );
    }

    #[test]
    fn message_with_no_surviving_parts_is_dropped() {
        let conv = normalize(&as_vec(json!([
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": [{"type": "video", "url": "x"}]}
        ])));
        assert_eq!(conv.messages(), &[ChatMessage::text(Role::System, "be brief")]);
    }

    #[test]
    fn order_is_preserved() {
        let conv = normalize(&as_vec(json!([
            {"role": "system", "content": "s"},
            {"role": "user", "content": "u1"},
            {"role": "assistant", "content": "a1"},
            {"role": "user", "content": "u2"}
        ])));
        let roles: Vec<&str> = conv.messages().iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(conv.messages()[3].content, MessageContent::Text("u2".to_string()));
    }

    #[test]
    fn non_object_entries_are_dropped() {
        let conv = normalize(&as_vec(json!(["hello", 3, null, {"role": "user", "content": "ok"}])));
        assert_eq!(conv.messages(), &[ChatMessage::text(Role::User, "ok")]);
    }

    #[test]
    fn deterministic() {
        let raw = as_vec(json!([
            {"role": "user", "content": [{"type": "text", "text": "a"}, {"type": "bogus"}]},
            {"role": "bot", "content": "b"}
        ]));
        assert_eq!(normalize(&raw), normalize(&raw));
    }

    #[test]
    fn wants_vision_only_with_image_part() {
        let text_only = normalize(&as_vec(json!([
            {"role": "user", "content": [{"type": "text", "text": "image_url"}]},
            {"role": "user", "content": "image_url"}
        ])));
        assert!(!text_only.wants_vision());

        let with_image = normalize(&as_vec(json!([
            {"role": "user", "content": "first"},
            {"role": "user", "content": [
                {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,/9j/"}}
            ]}
        ])));
        assert!(with_image.wants_vision());
    }

    #[test]
    fn fallback_never_wants_vision() {
        assert!(!normalize(&[]).wants_vision());
    }

    #[test]
    fn from_empty_vec_is_fallback() {
        let conv = Conversation::from(Vec::new());
        assert!(!conv.is_empty());
        assert_eq!(conv.messages()[0].role, Role::User);
    }
}
