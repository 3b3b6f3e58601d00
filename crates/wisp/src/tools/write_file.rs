use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::base::{Tool, ToolInvocation, ToolKind, ToolResult, ToolSchema};
use super::schema::{FieldSpec, FieldType, ParamSchema};
use crate::errors::{ToolError, ToolOutcome};

/// Creates or overwrites a file, creating missing parent directories
pub struct WriteFileTool {
    schema: ToolSchema,
}

impl WriteFileTool {
    pub fn new() -> Self {
        let schema = ParamSchema::new(vec![
            FieldSpec::new("path", FieldType::String)
                .required()
                .description("Absolute path, or path relative to the working directory."),
            FieldSpec::new("content", FieldType::String)
                .required()
                .description("The full text to write to the file."),
        ]);
        Self {
            schema: ToolSchema::Structured(schema),
        }
    }
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file, replacing it if it already exists."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Write
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, invocation: ToolInvocation) -> ToolResult {
        write(&invocation).await.unwrap_or_else(ToolResult::from)
    }
}

async fn write(invocation: &ToolInvocation) -> ToolOutcome<ToolResult> {
    let (Some(path_str), Some(content)) = (
        invocation.str_param("path"),
        invocation.str_param("content"),
    ) else {
        return Err(ToolError::InvalidParameters(
            "Missing 'path' or 'content' parameter".into(),
        ));
    };
    let path = invocation.resolve_path(path_str);

    if path.is_dir() {
        return Err(ToolError::InvalidParameters(format!(
            "The path '{}' is a directory, not a file",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::ExecutionError(format!("Failed to create directory: {}", e)))?;
    }

    let existed = path.exists();
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| ToolError::ExecutionError(format!("Failed to write file: {}", e)))?;
    debug!(path = %path.display(), bytes = content.len(), "wrote file");

    let verb = if existed { "Updated" } else { "Created" };
    Ok(ToolResult::success(format!("{} {}", verb, path.display()))
        .with_metadata("path", json!(path.display().to_string()))
        .with_metadata("bytes", json!(content.len())))
}
