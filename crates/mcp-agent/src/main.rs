//! Runs an agent backed by an OpenAI-compatible model against the GitHub
//! MCP server, with spans exported to Langfuse.

#[macro_use]
extern crate tracing;

mod cli;
mod config;
mod telemetry;
mod workflows;

use std::path::Path;

use anyhow::Context as _;
use clap::Parser;
use mcp_agent_core::Runner;
use mcp_agent_openai_model::OpenAIProvider;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer as _};

use crate::cli::{Cli, Command};
use crate::config::{GithubServer, ProcessEnv, TelemetryConfig};
use crate::telemetry::Telemetry;

fn main() -> anyhow::Result<()> {
    let dotenv = config::load_env_file(Path::new(".env"));
    let cli = Cli::parse();
    let command = cli.command();

    // Only the GitHub workflow is traced.
    let telemetry = match command {
        Command::Github { .. } if !cli.no_telemetry => {
            let config =
                TelemetryConfig::from_env(&ProcessEnv).context("invalid Langfuse configuration")?;
            Some(Telemetry::new(&config).context("failed to set up trace export")?)
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .with(telemetry.as_ref().map(Telemetry::layer))
        .init();
    match dotenv {
        Ok(true) => debug!("loaded environment from .env"),
        Ok(false) => debug!("no .env file, using the process environment"),
        Err(err) => warn!("failed to load .env: {err}"),
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let result = runtime.block_on(run(&cli, command));
    drop(runtime);

    if let Some(telemetry) = telemetry {
        telemetry.shutdown();
    }
    result
}

async fn run(cli: &Cli, command: Command) -> anyhow::Result<()> {
    let env = ProcessEnv;
    let openai = config::openai_config(&env).context("invalid model configuration")?;
    debug!("model configuration: {openai:?}");
    let provider = OpenAIProvider::new(openai);
    let runner = Runner::new(cli.run_config());

    match command {
        Command::Github { prompts } => {
            let server = GithubServer::from_env(&env).context("invalid GitHub configuration")?;
            workflows::github(provider, &server, &runner, prompts).await
        }
        Command::Joke { prompt } => workflows::joke(provider, &runner, prompt).await,
    }
}
