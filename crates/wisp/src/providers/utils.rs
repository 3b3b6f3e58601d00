use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde_json::{json, Value};

use super::base::{MessageComplete, TokenUsage};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::tool::ToolCall;

/// Wrap `{name, description, parameters}` tool schemas in openai's function envelope
pub fn tools_to_openai_spec(tools: &[Value]) -> ProviderResult<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        let name = tool
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Configuration("Tool schema without a name".into()))?;
        let name = sanitize_function_name(name);
        if !tool_names.insert(name.clone()) {
            return Err(ProviderError::Configuration(format!(
                "Duplicate tool name: {}",
                name
            )));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": name,
                "description": tool.get("description").cloned().unwrap_or(json!("")),
                "parameters": tool
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            }
        }));
    }

    Ok(result)
}

/// Read the usage block of a response or chunk, if the backend sent one
pub fn get_usage(data: &Value) -> Option<TokenUsage> {
    let usage = data.get("usage").filter(|usage| usage.is_object())?;
    let field = |name: &str| usage.get(name).and_then(Value::as_u64);

    let prompt_tokens = field("prompt_tokens").unwrap_or(0);
    let completion_tokens = field("completion_tokens").unwrap_or(0);
    let total_tokens =
        field("total_tokens").unwrap_or(prompt_tokens.saturating_add(completion_tokens));
    let cached_tokens = usage
        .pointer("/prompt_tokens_details/cached_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Some(
        TokenUsage::new(prompt_tokens, completion_tokens, total_tokens)
            .with_cached_tokens(cached_tokens),
    )
}

/// Convert the `tool_calls` array of an openai message
pub fn parse_tool_calls(tool_calls: &Value) -> Vec<ToolCall> {
    tool_calls
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .map(|call| {
                    let id = call["id"].as_str().unwrap_or_default();
                    let name = call["function"]["name"].as_str().unwrap_or_default();
                    let arguments = call["function"]["arguments"].as_str().unwrap_or_default();
                    ToolCall::new(id, name, arguments)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Convert a non streaming chat completion response into the terminal event payload
pub fn openai_response_to_completion(response: &Value) -> ProviderResult<MessageComplete> {
    if let Some(error) = response.get("error") {
        return Err(openai_error(error));
    }

    let choice = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .ok_or_else(|| ProviderError::InvalidResponse("Response has no choices".into()))?;
    let message = &choice["message"];

    Ok(MessageComplete {
        content: message["content"].as_str().map(String::from),
        finish_reason: choice["finish_reason"].as_str().map(String::from),
        usage: get_usage(response),
        tool_calls: parse_tool_calls(&message["tool_calls"]),
    })
}

/// Map an openai error object to the matching provider error
pub fn openai_error(error: &Value) -> ProviderError {
    if let Some(err) = check_openai_context_length_error(error) {
        return err;
    }
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| error.to_string());
    match error.get("code").and_then(Value::as_str) {
        Some("rate_limit_exceeded") => ProviderError::RateLimited(message),
        _ => ProviderError::InvalidResponse(message),
    }
}

pub fn check_openai_context_length_error(error: &Value) -> Option<ProviderError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ProviderError::ContextLengthExceeded(message))
    } else {
        None
    }
}

/// One line of a server sent event body
#[derive(Debug, PartialEq)]
pub enum SseLine {
    Data(Value),
    Done,
    Skip,
}

pub fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str(data) {
        Ok(value) => SseLine::Data(value),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping undecodable stream chunk");
            SseLine::Skip
        }
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Folds streamed chat completion chunks into the final event payload.
///
/// Tool call fragments are keyed by their `index`: the first fragment carries
/// the id and name, later ones append to the argument text.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    finish_reason: Option<String>,
    usage: Option<TokenUsage>,
    tool_calls: BTreeMap<u64, PartialToolCall>,
}

impl StreamAccumulator {
    /// Apply one chunk, returning the text delta it carried, if any
    pub fn apply_chunk(&mut self, chunk: &Value) -> Option<String> {
        if let Some(usage) = get_usage(chunk) {
            self.usage = Some(usage);
        }

        let choice = chunk.get("choices").and_then(|choices| choices.get(0))?;
        if let Some(reason) = choice["finish_reason"].as_str() {
            self.finish_reason = Some(reason.to_string());
        }

        let delta = &choice["delta"];
        if let Some(fragments) = delta["tool_calls"].as_array() {
            for (position, fragment) in fragments.iter().enumerate() {
                let index = fragment["index"].as_u64().unwrap_or(position as u64);
                let partial = self.tool_calls.entry(index).or_default();
                if let Some(id) = fragment["id"].as_str() {
                    partial.id.push_str(id);
                }
                if let Some(name) = fragment["function"]["name"].as_str() {
                    partial.name.push_str(name);
                }
                if let Some(arguments) = fragment["function"]["arguments"].as_str() {
                    partial.arguments.push_str(arguments);
                }
            }
        }

        match delta["content"].as_str() {
            Some(text) if !text.is_empty() => {
                self.content.push_str(text);
                Some(text.to_string())
            }
            _ => None,
        }
    }

    pub fn finish(self) -> MessageComplete {
        MessageComplete {
            content: (!self.content.is_empty()).then_some(self.content),
            finish_reason: self.finish_reason,
            usage: self.usage,
            tool_calls: self
                .tool_calls
                .into_values()
                .map(|partial| ToolCall::new(partial.id, partial.name, partial.arguments))
                .collect(),
        }
    }
}

pub fn sanitize_function_name(name: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    re.replace_all(name, "_").to_string()
}
