use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// A tool invocation requested by the model.
///
/// The argument payload is kept exactly as the backend sent it and only parsed
/// when the call is dispatched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Identifier that the answering tool message must reference
    pub id: String,
    /// The tool to run, absent when the backend omitted it
    pub name: Option<String>,
    /// Raw, possibly malformed, json arguments
    pub arguments: String,
}

impl ToolCall {
    pub fn new<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        let name = name.into();
        let id = id.into();
        Self {
            // Tool messages are matched by id, so every call needs one
            id: if id.is_empty() {
                format!("call_{}", Uuid::new_v4().simple())
            } else {
                id
            },
            name: (!name.is_empty()).then_some(name),
            arguments: arguments.into(),
        }
    }

    /// Parse the argument payload into a json object.
    ///
    /// Anything that is not a json object, including malformed text, yields an
    /// empty argument set.
    pub fn parse_arguments(&self) -> Map<String, Value> {
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Render in the shape openai expects inside an assistant message
    pub fn to_openai_spec(&self) -> Value {
        json!({
            "id": self.id,
            "type": "function",
            "function": {
                "name": self.name.as_deref().unwrap_or_default(),
                "arguments": self.arguments,
            }
        })
    }
}
