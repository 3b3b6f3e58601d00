use async_trait::async_trait;
use serde_json::json;

use super::base::{Tool, ToolInvocation, ToolKind, ToolResult, ToolSchema};
use super::schema::{FieldSpec, FieldType, ParamSchema};
use crate::errors::{ToolError, ToolOutcome};

/// Reads a text file, optionally a window of its lines
pub struct ReadFileTool {
    schema: ToolSchema,
}

impl ReadFileTool {
    pub fn new() -> Self {
        let schema = ParamSchema::new(vec![
            FieldSpec::new("path", FieldType::String)
                .required()
                .description("Absolute path, or path relative to the working directory."),
            FieldSpec::new("offset", FieldType::Integer)
                .minimum(1.0)
                .description("1-based line to start reading from. Defaults to 1."),
            FieldSpec::new("limit", FieldType::Integer)
                .minimum(1.0)
                .description("Maximum number of lines to read. Defaults to the whole file."),
        ]);
        Self {
            schema: ToolSchema::Structured(schema),
        }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. Use `offset` and `limit` to read part of a large file."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, invocation: ToolInvocation) -> ToolResult {
        read(&invocation).await.unwrap_or_else(ToolResult::from)
    }
}

async fn read(invocation: &ToolInvocation) -> ToolOutcome<ToolResult> {
    let path_str = invocation
        .str_param("path")
        .ok_or_else(|| ToolError::InvalidParameters("Missing 'path' parameter".into()))?;
    let path = invocation.resolve_path(path_str);

    if path.is_dir() {
        return Err(ToolError::InvalidParameters(format!(
            "The path '{}' is a directory, not a file",
            path.display()
        )));
    }

    let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolError::InvalidParameters(format!("The file '{}' does not exist", path.display()))
        } else {
            ToolError::ExecutionError(format!("Failed to read file: {}", e))
        }
    })?;

    let total_lines = content.lines().count();
    let offset = invocation.u64_param("offset").unwrap_or(1).max(1) as usize;
    let limit = invocation.u64_param("limit").map(|l| l as usize);

    let output = if offset == 1 && limit.is_none() {
        content
    } else {
        let lines = content.lines().skip(offset - 1);
        let selected: Vec<&str> = match limit {
            Some(limit) => lines.take(limit).collect(),
            None => lines.collect(),
        };
        selected.join("\n")
    };

    Ok(ToolResult::success(output)
        .with_metadata("path", json!(path.display().to_string()))
        .with_metadata("total_lines", json!(total_lines)))
}
