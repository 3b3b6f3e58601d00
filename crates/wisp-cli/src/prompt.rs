use async_trait::async_trait;
use console::style;
use std::io::{self, Write};
use tracing::warn;

use wisp::agent::AgentEvent;
use wisp::tools::{ToolApprover, ToolConfirmation};

/// Writes agent events to the terminal: text to `out`, failures to `err`
pub struct Renderer<O: Write, E: Write> {
    out: O,
    err: E,
    streamed: bool,
    failed: bool,
}

impl<O: Write, E: Write> Renderer<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            streamed: false,
            failed: false,
        }
    }

    pub fn render(&mut self, event: &AgentEvent) -> io::Result<()> {
        match event {
            AgentEvent::AgentStarted { .. } => {}
            AgentEvent::TextDelta { content } => {
                self.streamed = true;
                write!(self.out, "{}", content)?;
                self.out.flush()?;
            }
            AgentEvent::TextComplete { content } => {
                // Tool-enabled runs are not streamed, so nothing has been printed yet
                if !self.streamed {
                    write!(self.out, "{}", content)?;
                }
                writeln!(self.out)?;
                self.out.flush()?;
            }
            AgentEvent::AgentError { error, .. } => {
                self.failed = true;
                if self.streamed {
                    writeln!(self.out)?;
                }
                writeln!(self.err, "{} {}", style("error:").red().bold(), error)?;
            }
            AgentEvent::AgentFinished { usage, .. } => {
                if let Some(usage) = usage {
                    tracing::info!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        total_tokens = usage.total_tokens,
                        "token usage"
                    );
                }
            }
        }
        Ok(())
    }

    /// Whether the run reported an error
    pub fn failed(&self) -> bool {
        self.failed
    }
}

/// Asks on the terminal before a mutating tool runs
pub struct CliApprover;

#[async_trait]
impl ToolApprover for CliApprover {
    async fn approve(&self, confirmation: &ToolConfirmation) -> bool {
        let params = serde_json::to_string(&confirmation.params).unwrap_or_default();
        let question = format!(
            "Allow {} with {}?",
            style(&confirmation.tool_name).cyan(),
            style(params).dim()
        );

        let answer = tokio::task::spawn_blocking(move || {
            cliclack::confirm(question).initial_value(false).interact()
        })
        .await;

        match answer {
            Ok(Ok(approved)) => approved,
            Ok(Err(e)) => {
                warn!(error = %e, "confirmation prompt failed, declining");
                false
            }
            Err(e) => {
                warn!(error = %e, "confirmation prompt panicked, declining");
                false
            }
        }
    }
}
