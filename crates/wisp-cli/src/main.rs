mod configuration;
mod logging;
mod prompt;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use futures::StreamExt;
use std::io;
use std::process;
use std::sync::Arc;

use configuration::{CliOverrides, Settings};
use prompt::{CliApprover, Renderer};
use wisp::agent::{Agent, AgentConfig};
use wisp::context::ContextManager;
use wisp::prompt_template::system_prompt;
use wisp::providers::openai::OpenAiProvider;
use wisp::tools::{default_registry, ToolRegistry};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The message to send to the agent
    prompt: Option<String>,

    /// Model to use (overrides MODEL and wisp.toml)
    #[arg(short, long)]
    model: Option<String>,

    /// Base url of an openai compatible endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Run without any tools, streaming the answer
    #[arg(long)]
    no_tools: bool,

    /// Run mutating tools without asking
    #[arg(short, long)]
    yes: bool,

    /// Maximum number of model calls for the run
    #[arg(long)]
    max_steps: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            max_steps: self.max_steps,
            no_tools: self.no_tools,
            yes: self.yes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let Some(message) = cli.prompt.clone().filter(|p| !p.trim().is_empty()) else {
        eprintln!(
            "{} wisp [OPTIONS] <PROMPT>\n\nRun `wisp --help` for more information.",
            style("Usage:").bold()
        );
        process::exit(2);
    };

    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let mut settings = Settings::load(&cwd).context("Failed to load configuration")?;
    settings.apply(cli.overrides());

    let provider = OpenAiProvider::new(settings.provider_config()?);
    let registry = if settings.agent.tools {
        default_registry()
    } else {
        ToolRegistry::new()
    };
    let system = system_prompt(&registry, &cwd).context("Failed to render the system prompt")?;

    let config = AgentConfig {
        max_steps: settings.agent.max_steps,
        cwd,
    };
    let mut agent = Agent::new(
        Box::new(provider),
        registry,
        ContextManager::new(Some(system)),
        config,
    );
    if !settings.agent.auto_approve {
        agent = agent.with_approver(Arc::new(CliApprover));
    }

    let mut renderer = Renderer::new(io::stdout(), io::stderr());
    {
        let mut events = agent.run(message);
        while let Some(event) = events.next().await {
            renderer.render(&event)?;
        }
    }
    agent.close().await;

    if renderer.failed() {
        process::exit(1);
    }
    Ok(())
}
