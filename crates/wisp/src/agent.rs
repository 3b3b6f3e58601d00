pub mod events;

use futures::stream::{BoxStream, StreamExt};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use events::AgentEvent;

use crate::context::ContextManager;
use crate::errors::ContextError;
use crate::models::tool::ToolCall;
use crate::providers::base::{MessageComplete, Provider, StreamEvent, TokenUsage};
use crate::tools::{AutoApprove, ToolApprover, ToolInvocation, ToolRegistry};

pub const DEFAULT_MAX_STEPS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Model calls allowed per run before it is abandoned
    pub max_steps: usize,
    /// Working directory handed to every tool invocation
    pub cwd: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Agent drives one conversation: it calls the provider, runs the tools the
/// model asks for and feeds their results back until the model answers.
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    context: ContextManager,
    config: AgentConfig,
    approver: Arc<dyn ToolApprover>,
}

impl Agent {
    pub fn new(
        provider: Box<dyn Provider>,
        registry: ToolRegistry,
        context: ContextManager,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            context,
            config,
            approver: Arc::new(AutoApprove),
        }
    }

    /// Replace the collaborator consulted before mutating tools run
    pub fn with_approver(mut self, approver: Arc<dyn ToolApprover>) -> Self {
        self.approver = approver;
        self
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Process one user message.
    ///
    /// The stream starts with `AgentStarted` and always ends with
    /// `AgentFinished`. Failures are reported as `AgentError` events.
    pub fn run<S: Into<String>>(&mut self, message: S) -> BoxStream<'_, AgentEvent> {
        let message = message.into();
        Box::pin(async_stream::stream! {
            info!(max_steps = self.config.max_steps, "agent run started");
            yield AgentEvent::agent_started(message.clone());
            self.context.add_user_message(message);

            let mut final_text: Option<String> = None;
            let mut usage: Option<TokenUsage> = None;
            let mut answered = false;
            let mut failed = false;

            'steps: for step in 1..=self.config.max_steps {
                let messages = self.context.get_messages();
                let schemas = self.registry.get_schemas();
                debug!(step, messages = messages.len(), tools = schemas.len(), "agent step");

                if schemas.is_empty() {
                    let mut text = String::new();
                    let mut events = self.provider.chat_completion(messages, None, true);
                    let mut complete = None;
                    while let Some(event) = events.next().await {
                        match event {
                            StreamEvent::TextDelta { content } => {
                                text.push_str(&content);
                                yield AgentEvent::text_delta(content);
                            }
                            StreamEvent::MessageComplete(done) => {
                                complete = Some(done);
                                break;
                            }
                            StreamEvent::Error { error } => {
                                yield AgentEvent::agent_error(error)
                                    .with_detail("step", json!(step));
                                failed = true;
                                break 'steps;
                            }
                        }
                    }
                    drop(events);

                    let Some(complete) = complete else {
                        yield AgentEvent::agent_error("stream ended without a completion")
                            .with_detail("step", json!(step));
                        failed = true;
                        break 'steps;
                    };
                    add_usage(&mut usage, complete.usage);
                    if text.is_empty() {
                        text = complete.content.unwrap_or_default();
                    }

                    self.context.add_assistant_message(Some(text.clone()), Vec::new());
                    yield AgentEvent::text_complete(text.clone());
                    final_text = Some(text);
                    answered = true;
                    break 'steps;
                }

                let collected =
                    collect_completion(self.provider.as_ref(), messages, schemas).await;
                let complete = match collected {
                    Ok(complete) => complete,
                    Err(error) => {
                        yield AgentEvent::agent_error(error).with_detail("step", json!(step));
                        failed = true;
                        break 'steps;
                    }
                };
                add_usage(&mut usage, complete.usage);

                if complete.tool_calls.is_empty() {
                    let text = complete.content.unwrap_or_default();
                    self.context.add_assistant_message(Some(text.clone()), Vec::new());
                    yield AgentEvent::text_complete(text.clone());
                    final_text = Some(text);
                    answered = true;
                    break 'steps;
                }

                if let Some(text) = complete.content.as_ref().filter(|t| !t.is_empty()) {
                    final_text = Some(text.clone());
                }
                self.context
                    .add_assistant_message(complete.content, complete.tool_calls.clone());

                if let Err(e) = self.run_tool_calls(&complete.tool_calls).await {
                    yield AgentEvent::agent_error(e.to_string()).with_detail("step", json!(step));
                    failed = true;
                    break 'steps;
                }
            }

            if !answered && !failed {
                warn!(max_steps = self.config.max_steps, "tool loop exceeded maximum steps");
                yield AgentEvent::agent_error("tool loop exceeded maximum steps")
                    .with_detail("max_steps", json!(self.config.max_steps));
            }

            info!(answered, "agent run finished");
            yield AgentEvent::agent_finished(final_text, usage);
        })
    }

    /// Release the provider's connection. Safe to call more than once.
    pub async fn close(&self) {
        self.provider.close().await;
    }

    /// Execute requested calls in order, answering each with one tool message
    async fn run_tool_calls(&mut self, calls: &[ToolCall]) -> Result<(), ContextError> {
        for call in calls {
            let Some(name) = call.name.as_deref().filter(|n| !n.is_empty()) else {
                warn!(id = %call.id, "tool call without a tool name");
                self.context.add_tool_message(
                    call.id.clone(),
                    format!("Tool call {} is missing a tool name", call.id),
                )?;
                continue;
            };

            let params = call.parse_arguments();
            if !self.approve(name, &params).await {
                warn!(tool = %name, "tool call declined");
                self.context
                    .add_tool_message(call.id.clone(), format!("Tool execution denied: {}", name))?;
                continue;
            }

            let result = self.registry.invoke(name, params, &self.config.cwd).await;
            debug!(tool = %name, success = result.success, "tool call finished");
            self.context
                .add_tool_message(call.id.clone(), result.content())?;
        }
        Ok(())
    }

    /// Ask the approver about mutating tools with valid parameters.
    ///
    /// Unknown tools and invalid parameters pass through so the registry can
    /// report them.
    async fn approve(&self, name: &str, params: &Map<String, Value>) -> bool {
        let Some(tool) = self.registry.get(name) else {
            return true;
        };
        if !tool.validate_params(params).is_empty() {
            return true;
        }
        let invocation = ToolInvocation::new(params.clone(), self.config.cwd.clone());
        match tool.get_confirmation(&invocation) {
            Some(confirmation) => self.approver.approve(&confirmation).await,
            None => true,
        }
    }
}

/// Drive a non-streaming call to its terminal event
async fn collect_completion(
    provider: &dyn Provider,
    messages: Vec<Value>,
    tools: Vec<Value>,
) -> Result<MessageComplete, String> {
    let mut events = provider.chat_completion(messages, Some(tools), false);
    let mut text = String::new();
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::TextDelta { content } => text.push_str(&content),
            StreamEvent::MessageComplete(mut complete) => {
                if complete.content.is_none() && !text.is_empty() {
                    complete.content = Some(text);
                }
                return Ok(complete);
            }
            StreamEvent::Error { error } => return Err(error),
        }
    }
    Err("stream ended without a completion".to_string())
}

fn add_usage(total: &mut Option<TokenUsage>, usage: Option<TokenUsage>) {
    if let Some(usage) = usage {
        *total.get_or_insert_with(TokenUsage::default) += usage;
    }
}
