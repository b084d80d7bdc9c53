use std::time::Duration;

use clap::{Parser, Subcommand};
use mcp_agent_core::RunConfig;

/// Runs an agent wired to a GitHub MCP tool server.
#[derive(Parser, Debug)]
#[command(name = "mcp-agent", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Keep spans local instead of sending them to Langfuse.
    #[arg(long, global = true)]
    pub no_telemetry: bool,

    /// Maximum number of model calls per turn.
    #[arg(long, global = true, default_value_t = 10)]
    pub max_steps: usize,

    /// Timeout for each tool call, in seconds.
    #[arg(long, global = true, value_name = "SECS", default_value_t = 60)]
    pub tool_timeout: u64,

    /// Timeout for each model call, in seconds.
    #[arg(long, global = true, value_name = "SECS", default_value_t = 120)]
    pub model_timeout: u64,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Ask questions about GitHub repositories (default).
    Github {
        /// Replaces the built-in questions. May be repeated.
        #[arg(long = "prompt", value_name = "TEXT")]
        prompts: Vec<String>,
    },
    /// Ask for a joke. No tools involved.
    Joke {
        /// Replaces the built-in request.
        #[arg(long, value_name = "TEXT")]
        prompt: Option<String>,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Github { prompts: vec![] }
    }
}

impl Cli {
    /// The selected command, `github` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or_default()
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            max_steps: self.max_steps,
            tool_timeout: Duration::from_secs(self.tool_timeout),
            model_timeout: Duration::from_secs(self.model_timeout),
        }
    }
}
