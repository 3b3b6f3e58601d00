use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::providers::base::TokenUsage;

/// What a run reports to its caller.
///
/// A run starts with `AgentStarted` and always ends with `AgentFinished`.
/// Serialized as `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AgentEvent {
    AgentStarted {
        message: String,
    },
    TextDelta {
        content: String,
    },
    TextComplete {
        content: String,
    },
    AgentFinished {
        message: Option<String>,
        usage: Option<TokenUsage>,
    },
    AgentError {
        error: String,
        #[serde(default)]
        details: Map<String, Value>,
    },
}

impl AgentEvent {
    pub fn agent_started<S: Into<String>>(message: S) -> Self {
        AgentEvent::AgentStarted {
            message: message.into(),
        }
    }

    pub fn text_delta<S: Into<String>>(content: S) -> Self {
        AgentEvent::TextDelta {
            content: content.into(),
        }
    }

    pub fn text_complete<S: Into<String>>(content: S) -> Self {
        AgentEvent::TextComplete {
            content: content.into(),
        }
    }

    pub fn agent_finished(message: Option<String>, usage: Option<TokenUsage>) -> Self {
        AgentEvent::AgentFinished { message, usage }
    }

    pub fn agent_error<S: Into<String>>(error: S) -> Self {
        AgentEvent::AgentError {
            error: error.into(),
            details: Map::new(),
        }
    }

    pub fn with_detail<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        if let AgentEvent::AgentError { details, .. } = &mut self {
            details.insert(key.into(), value);
        }
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AgentEvent::AgentError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(AgentEvent::text_delta("Hel")).unwrap();
        assert_eq!(value, json!({"type": "text_delta", "data": {"content": "Hel"}}));

        let value = serde_json::to_value(AgentEvent::agent_finished(
            Some("done".to_string()),
            Some(TokenUsage::new(1, 2, 3)),
        ))
        .unwrap();
        assert_eq!(value["type"], "agent_finished");
        assert_eq!(value["data"]["message"], "done");
        assert_eq!(value["data"]["usage"]["total_tokens"], 3);
    }

    #[test]
    fn test_error_details() {
        let event = AgentEvent::agent_error("boom").with_detail("step", json!(2));
        assert!(event.is_error());

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "agent_error", "data": {"error": "boom", "details": {"step": 2}}})
        );

        let parsed: AgentEvent = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_with_detail_ignores_other_kinds() {
        let event = AgentEvent::text_complete("hi").with_detail("step", json!(1));
        assert_eq!(event, AgentEvent::text_complete("hi"));
    }
}
