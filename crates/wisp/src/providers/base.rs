use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::tool::ToolCall;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cached_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
            cached_tokens: 0,
        }
    }

    pub fn with_cached_tokens(mut self, cached_tokens: u64) -> Self {
        self.cached_tokens = cached_tokens;
        self
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
        self.cached_tokens = self.cached_tokens.saturating_add(other.cached_tokens);
    }
}

/// Terminal payload of one model call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageComplete {
    /// The whole assistant text of the call, if it produced any
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    /// Only present when the backend reported it
    pub usage: Option<TokenUsage>,
    pub tool_calls: Vec<ToolCall>,
}

/// Events produced by a single completion call.
///
/// Any number of `TextDelta` events are followed by exactly one terminal event,
/// either `MessageComplete` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    TextDelta { content: String },
    MessageComplete(MessageComplete),
    Error { error: String },
}

impl StreamEvent {
    pub fn text_delta<S: Into<String>>(content: S) -> Self {
        StreamEvent::TextDelta {
            content: content.into(),
        }
    }

    pub fn error<S: Into<String>>(error: S) -> Self {
        StreamEvent::Error {
            error: error.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::TextDelta { .. })
    }
}

/// A chat completion backend.
///
/// Implementations never fail at this boundary: every failure is reported as a
/// terminal `StreamEvent::Error` on the returned stream.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Submit the conversation and get back a lazy, single pass event stream.
    ///
    /// `messages` and `tools` are already in chat completion wire format.
    fn chat_completion(
        &self,
        messages: Vec<Value>,
        tools: Option<Vec<Value>>,
        stream: bool,
    ) -> BoxStream<'_, StreamEvent>;

    /// Release the backend connection. Safe to call repeatedly, or before any request.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage += TokenUsage::new(10, 20, 30);
        usage += TokenUsage::new(1, 2, 3).with_cached_tokens(4);
        assert_eq!(usage, TokenUsage::new(11, 22, 33).with_cached_tokens(4));
    }

    #[test]
    fn test_usage_saturates() {
        let mut usage = TokenUsage::new(u64::MAX - 1, 0, u64::MAX);
        usage += TokenUsage::new(5, 1, 6);
        assert_eq!(usage.prompt_tokens, u64::MAX);
        assert_eq!(usage.total_tokens, u64::MAX);
        assert_eq!(usage.completion_tokens, 1);
    }

    #[test]
    fn test_terminal_events() {
        assert!(!StreamEvent::text_delta("hi").is_terminal());
        assert!(StreamEvent::error("boom").is_terminal());
        assert!(StreamEvent::MessageComplete(MessageComplete::default()).is_terminal());
    }

    #[test]
    fn test_stream_event_serialization() {
        let value = serde_json::to_value(StreamEvent::text_delta("Hel")).unwrap();
        assert_eq!(value, json!({"type": "text_delta", "content": "Hel"}));

        let value = serde_json::to_value(StreamEvent::error("boom")).unwrap();
        assert_eq!(value, json!({"type": "error", "error": "boom"}));
    }
}
