use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wisp::agent::{Agent, AgentConfig, AgentEvent};
use wisp::context::ContextManager;
use wisp::prompt_template::system_prompt;
use wisp::providers::configs::OpenAiProviderConfig;
use wisp::providers::openai::OpenAiProvider;
use wisp::providers::retry::RetryConfig;
use wisp::tools::{
    default_registry, Tool, ToolInvocation, ToolKind, ToolRegistry, ToolResult, ToolSchema,
};

struct SearchTool {
    schema: ToolSchema,
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web.search"
    }

    fn description(&self) -> &str {
        "Search the web"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, invocation: ToolInvocation) -> ToolResult {
        let query = invocation.str_param("query").unwrap_or_default();
        ToolResult::success(format!("results for {}", query))
    }
}

fn provider(uri: String) -> OpenAiProvider {
    let mut config = OpenAiProviderConfig::new("test_api_key");
    config.base_url = uri;
    OpenAiProvider::new(config).with_retry(RetryConfig::new(3, Duration::from_millis(5)))
}

#[tokio::test]
async fn test_agent_writes_file_through_backend() -> anyhow::Result<()> {
    let workdir = tempfile::tempdir()?;
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test_api_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "write_file",
                            "arguments": "{\"path\": \"notes/hello.txt\", \"content\": \"hi\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"content": "I wrote notes/hello.txt"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 150, "completion_tokens": 10, "total_tokens": 160}
        })))
        .mount(&mock_server)
        .await;

    let registry = default_registry();
    let context = ContextManager::new(Some(system_prompt(&registry, workdir.path())?));
    let config = AgentConfig {
        cwd: workdir.path().to_path_buf(),
        ..AgentConfig::default()
    };
    let mut agent = Agent::new(
        Box::new(provider(mock_server.uri())),
        registry,
        context,
        config,
    );

    let events: Vec<AgentEvent> = agent.run("Write hi to notes/hello.txt").collect().await;
    agent.close().await;

    assert!(events.iter().all(|e| !e.is_error()), "{:?}", events);
    assert_eq!(
        std::fs::read_to_string(workdir.path().join("notes/hello.txt"))?,
        "hi"
    );
    match events.last() {
        Some(AgentEvent::AgentFinished { message, usage }) => {
            assert_eq!(message.as_deref(), Some("I wrote notes/hello.txt"));
            assert_eq!(usage.map(|u| u.total_tokens), Some(280));
        }
        other => panic!("unexpected last event: {:?}", other),
    }

    let requests = mock_server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
    let second: Value = requests[1].body_json()?;
    let messages = second["messages"].as_array().cloned().unwrap_or_default();
    assert_eq!(messages[0]["role"], "system");
    let tool_message = messages
        .iter()
        .find(|m| m["role"] == "tool")
        .cloned()
        .unwrap_or_default();
    assert_eq!(tool_message["tool_call_id"], "call_1");
    assert!(tool_message["content"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Created"));
    Ok(())
}

#[tokio::test]
async fn test_agent_streams_without_tools() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    let chunks = [
        json!({"choices": [{"delta": {"content": "Hello"}, "finish_reason": null}]}),
        json!({"choices": [{"delta": {"content": " there"}, "finish_reason": "stop"}]}),
        json!({"choices": [], "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}}),
    ];
    let mut body: String = chunks
        .iter()
        .map(|chunk| format!("data: {}\n\n", chunk))
        .collect();
    body.push_str("data: [DONE]\n\n");

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut agent = Agent::new(
        Box::new(provider(mock_server.uri())),
        ToolRegistry::new(),
        ContextManager::new(None),
        AgentConfig::default(),
    );

    let events: Vec<AgentEvent> = agent.run("Hi").collect().await;
    let deltas: String = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::TextDelta { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, "Hello there");
    assert!(events.contains(&AgentEvent::text_complete("Hello there")));
    Ok(())
}

#[tokio::test]
async fn test_agent_reports_backend_failure() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut agent = Agent::new(
        Box::new(provider(mock_server.uri())),
        default_registry(),
        ContextManager::new(None),
        AgentConfig::default(),
    );

    let events: Vec<AgentEvent> = agent.run("Hi").collect().await;
    let errors: Vec<&AgentEvent> = events.iter().filter(|e| e.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(events.last(), Some(AgentEvent::AgentFinished { message: None, .. })));
    Ok(())
}

#[tokio::test]
async fn test_agent_calls_tool_by_offered_name() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "web_search", "arguments": "{\"query\": \"rust\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "done"}, "finish_reason": "stop"}]
        })))
        .mount(&mock_server)
        .await;

    let mut registry = ToolRegistry::new();
    assert!(registry.register(SearchTool {
        schema: ToolSchema::Raw(json!({
            "type": "object",
            "properties": {"query": {"type": "string"}}
        })),
    }));
    let mut agent = Agent::new(
        Box::new(provider(mock_server.uri())),
        registry,
        ContextManager::new(None),
        AgentConfig::default(),
    );

    let events: Vec<AgentEvent> = agent.run("Search for rust").collect().await;
    assert!(events.iter().all(|e| !e.is_error()), "{:?}", events);

    let requests = mock_server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
    let first: Value = requests[0].body_json()?;
    assert_eq!(first["tools"][0]["function"]["name"], "web_search");
    let second: Value = requests[1].body_json()?;
    let tool_message = second["messages"]
        .as_array()
        .and_then(|messages| messages.iter().find(|m| m["role"] == "tool"))
        .cloned()
        .unwrap_or_default();
    assert_eq!(tool_message["content"], "results for rust");
    Ok(())
}
