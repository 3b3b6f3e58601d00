use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumIter, EnumString};

use super::schema::ParamSchema;
use crate::errors::ToolError;

/// Broad classification of a tool's side effects
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolKind {
    Read,
    Write,
    Shell,
    Network,
    Memory,
    Mcp,
}

impl ToolKind {
    /// Everything but plain reads may change the world
    pub fn is_mutating(self) -> bool {
        self != ToolKind::Read
    }
}

/// Outcome of one tool invocation.
///
/// `success` decides which of `output` and `error` is authoritative; both may
/// be present, e.g. a failed command still reports what it printed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ToolResult {
    pub fn success<S: Into<String>>(output: S) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn error<S: Into<String>>(error: S) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            metadata: Map::new(),
        }
    }

    pub fn with_output<S: Into<String>>(mut self, output: S) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_metadata<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The text the model should see for this result
    pub fn content(&self) -> &str {
        if self.success {
            self.output.as_deref().unwrap_or_default()
        } else {
            self.error.as_deref().unwrap_or("Tool failed without an error message")
        }
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::error(err.to_string())
    }
}

/// Validated parameters plus the directory the tool acts in
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub params: Map<String, Value>,
    pub cwd: PathBuf,
}

impl ToolInvocation {
    pub fn new<P: Into<PathBuf>>(params: Map<String, Value>, cwd: P) -> Self {
        Self {
            params,
            cwd: cwd.into(),
        }
    }

    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    pub fn u64_param(&self, name: &str) -> Option<u64> {
        self.params.get(name).and_then(Value::as_u64)
    }

    /// Resolve a path parameter against the invocation directory, expanding `~`
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        resolve_path(&self.cwd, path)
    }
}

pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// What an approval collaborator is shown before a mutating tool runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolConfirmation {
    pub tool_name: String,
    pub params: Map<String, Value>,
    pub description: Option<String>,
}

/// How a tool describes its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum ToolSchema {
    /// Typed field list, validated before execution
    Structured(ParamSchema),
    /// A json schema mapping passed to the model verbatim and not validated
    Raw(Value),
}

/// A capability the model can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique key the model uses to call this tool
    fn name(&self) -> &str;

    /// Shown to the model to help it choose a tool
    fn description(&self) -> &str;

    fn kind(&self) -> ToolKind;

    fn schema(&self) -> &ToolSchema;

    /// Run the tool. Implementations report every failure through the result.
    async fn execute(&self, invocation: ToolInvocation) -> ToolResult;

    /// Check parameters against the schema, one `field: message` entry per violation
    fn validate_params(&self, params: &Map<String, Value>) -> Vec<String> {
        match self.schema() {
            ToolSchema::Structured(schema) => schema.validate(params),
            ToolSchema::Raw(_) => Vec::new(),
        }
    }

    fn is_mutating(&self) -> bool {
        self.kind().is_mutating()
    }

    /// The sign-off request for this invocation, `None` when no sign-off is needed
    fn get_confirmation(&self, invocation: &ToolInvocation) -> Option<ToolConfirmation> {
        if !self.is_mutating() {
            return None;
        }
        Some(ToolConfirmation {
            tool_name: self.name().to_string(),
            params: invocation.params.clone(),
            description: Some(self.description().to_string()),
        })
    }

    /// Project into the `{name, description, parameters}` shape used for tool calling
    fn to_openai_schema(&self) -> Value {
        let parameters = match self.schema() {
            ToolSchema::Structured(schema) => schema.to_json_schema(),
            ToolSchema::Raw(raw) => raw.get("parameters").unwrap_or(raw).clone(),
        };
        json!({
            "name": self.name(),
            "description": self.description(),
            "parameters": parameters,
        })
    }
}
