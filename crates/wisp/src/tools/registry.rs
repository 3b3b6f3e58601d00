use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::base::{Tool, ToolInvocation, ToolResult};
use super::read_file::ReadFileTool;
use super::shell::ShellTool;
use super::write_file::WriteFileTool;
use crate::providers::utils::sanitize_function_name;

/// Name-keyed collection of tools that validates and dispatches invocations.
///
/// Tools keep the order in which they were first registered, which is the
/// order their schemas are offered to the model. Backends only accept
/// `[a-zA-Z0-9_-]` in function names, so lookups also resolve the sanitized
/// form the model sends back.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
    wire_names: HashMap<String, String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool already registered under the same name.
    ///
    /// Returns false and leaves the registry unchanged when the name would be
    /// offered to the model under the same function name as another tool.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> bool {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> bool {
        let name = tool.name().to_string();
        let wire_name = sanitize_function_name(&name);
        if let Some(owner) = self.wire_names.get(&wire_name).filter(|owner| **owner != name) {
            error!(
                tool = %name,
                conflicts_with = %owner,
                "tool name clashes with a registered tool"
            );
            return false;
        }

        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "tool already registered, overwriting");
        } else {
            self.order.push(name.clone());
        }
        self.wire_names.insert(wire_name, name.clone());
        info!(tool = %name, "registered tool");
        true
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(name) = self.resolve(name).map(str::to_string) else {
            return false;
        };
        self.tools.remove(&name);
        self.order.retain(|n| *n != name);
        self.wire_names.remove(&sanitize_function_name(&name));
        true
    }

    /// Find a tool by its registered name or by the name offered to the model
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let name = self.resolve(name)?;
        self.tools.get(name).cloned()
    }

    fn resolve<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.tools.contains_key(name) {
            return Some(name);
        }
        self.wire_names.get(name).map(String::as_str)
    }

    pub fn get_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    pub fn get_schemas(&self) -> Vec<Value> {
        self.get_tools()
            .iter()
            .map(|tool| tool.to_openai_schema())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up, validate and execute a tool.
    ///
    /// Never fails: unknown tools, invalid parameters and panics inside the
    /// tool all come back as an error result.
    pub async fn invoke(&self, name: &str, params: Map<String, Value>, cwd: &Path) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::error(format!("Unknown tool: {}", name))
                .with_metadata("tool_name", json!(name));
        };

        let validation_errors = tool.validate_params(&params);
        if !validation_errors.is_empty() {
            return ToolResult::error(format!(
                "Invalid parameters: {}",
                validation_errors.join("; ")
            ))
            .with_metadata("tool_name", json!(name))
            .with_metadata("validation_errors", json!(validation_errors));
        }

        debug!(tool = %name, "invoking tool");
        let invocation = ToolInvocation::new(params, cwd);
        match AssertUnwindSafe(tool.execute(invocation)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = %name, error = %message, "tool raised unexpected error");
                ToolResult::error(format!("Internal error: {}", message))
                    .with_metadata("tool_name", json!(name))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool panicked".to_string()
    }
}

/// A registry holding every built-in tool
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ReadFileTool::new());
    registry.register(WriteFileTool::new());
    registry.register(ShellTool::new());
    registry
}
