use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::role::Role;
use super::tool::ToolCall;

/// Role specific side channel of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageExtra {
    /// Tool calls an assistant turn requested
    ToolCalls(Vec<ToolCall>),
    /// The tool call a tool turn responds to
    ToolCallId(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One turn of the conversation
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<MessageExtra>,
}

impl Message {
    fn new(role: Role, content: Option<String>, extra: Option<MessageExtra>) -> Self {
        Message {
            role,
            content,
            token_count: None,
            extra,
        }
    }

    pub fn system<S: Into<String>>(text: S) -> Self {
        Self::new(Role::System, Some(text.into()), None)
    }

    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User, Some(text.into()), None)
    }

    /// Create an assistant message, optionally recording the tool calls it requested
    pub fn assistant(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        let extra = (!tool_calls.is_empty()).then_some(MessageExtra::ToolCalls(tool_calls));
        Self::new(Role::Assistant, text, extra)
    }

    pub fn tool<I: Into<String>, S: Into<String>>(tool_call_id: I, text: S) -> Self {
        Self::new(
            Role::Tool,
            Some(text.into()),
            Some(MessageExtra::ToolCallId(tool_call_id.into())),
        )
    }

    pub fn with_token_count(mut self, token_count: usize) -> Self {
        self.token_count = Some(token_count);
        self
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match &self.extra {
            Some(MessageExtra::ToolCalls(calls)) => calls,
            _ => &[],
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match &self.extra {
            Some(MessageExtra::ToolCallId(id)) => Some(id),
            _ => None,
        }
    }

    /// Reduce to the `{role, content, ...extra}` shape of the chat completion api
    pub fn to_openai_spec(&self) -> Value {
        let mut spec = json!({
            "role": self.role,
            "content": self.content.as_deref().unwrap_or_default(),
        });

        match &self.extra {
            Some(MessageExtra::ToolCalls(calls)) => {
                spec["tool_calls"] = calls.iter().map(ToolCall::to_openai_spec).collect();
            }
            Some(MessageExtra::ToolCallId(id)) => {
                spec["tool_call_id"] = json!(id);
            }
            None => {}
        }

        spec
    }
}
