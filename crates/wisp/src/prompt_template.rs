use chrono::Local;
use include_dir::{include_dir, Dir};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Error as TeraError, Tera};

use crate::tools::ToolRegistry;

static PROMPTS: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    tera.render("inline_template", &context)
}

/// Render a template file, preferring a path on disk over the bundled prompts
pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();
    let template_content = if template_path.exists() {
        fs::read_to_string(&template_path)
            .map_err(|e| TeraError::chain("Failed to read template file", e))?
    } else {
        PROMPTS
            .get_file(&template_path)
            .and_then(|file| file.contents_utf8())
            .ok_or_else(|| {
                TeraError::msg(format!("Unknown prompt template: {}", template_path.display()))
            })?
            .to_string()
    };
    load_prompt(&template_content, context_data)
}

#[derive(Serialize)]
struct ToolInfo<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct SystemPromptContext<'a> {
    tools: Vec<ToolInfo<'a>>,
    cwd: String,
    date: String,
}

/// The default system prompt for an agent working in `cwd` with `registry`
pub fn system_prompt(registry: &ToolRegistry, cwd: &Path) -> Result<String, TeraError> {
    let tools = registry.get_tools();
    let context = SystemPromptContext {
        tools: tools
            .iter()
            .map(|tool| ToolInfo {
                name: tool.name(),
                description: tool.description(),
            })
            .collect(),
        cwd: cwd.display().to_string(),
        date: Local::now().format("%Y-%m-%d").to_string(),
    };
    load_prompt_file("system.md", &context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::default_registry;
    use std::collections::HashMap;

    #[test]
    fn test_load_prompt() {
        let template = "Hello, {{ name }}! You are {{ age }} years old.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());
        context.insert("age".to_string(), 30.to_string());

        let result = load_prompt(template, &context).unwrap();
        assert_eq!(result, "Hello, Alice! You are 30 years old.");
    }

    #[test]
    fn test_load_prompt_missing_variable() {
        let template = "Hello, {{ name }}! You are {{ age }} years old.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());

        assert!(load_prompt(template, &context).is_err());
    }

    #[test]
    fn test_load_prompt_file_from_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("greeting.txt");
        fs::write(&file_path, "Hello, {{ name }}!").unwrap();

        let mut context = HashMap::new();
        context.insert("name".to_string(), "Bob".to_string());

        let result = load_prompt_file(file_path, &context).unwrap();
        assert_eq!(result, "Hello, Bob!");
    }

    #[test]
    fn test_load_prompt_file_unknown() {
        let context: HashMap<String, String> = HashMap::new();
        assert!(load_prompt_file("non_existent_template.txt", &context).is_err());
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let prompt = system_prompt(&default_registry(), Path::new("/work/project")).unwrap();
        assert!(prompt.contains("`/work/project`"));
        assert!(prompt.contains("- **read_file**:"));
        assert!(prompt.contains("- **shell**:"));
        assert!(!prompt.contains("No tools are available"));
    }

    #[test]
    fn test_system_prompt_without_tools() {
        let prompt = system_prompt(&ToolRegistry::new(), Path::new("/tmp")).unwrap();
        assert!(prompt.contains("No tools are available"));
        assert!(prompt.contains(&Local::now().format("%Y-%m-%d").to_string()));
    }
}
