//! The two example conversations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use indicatif::{ProgressBar, ProgressStyle};
use mcp_agent_core::trace::with_scope;
use mcp_agent_core::{AgentBuilder, ConversationTurn, RunError, Runner, ServerSession};
use mcp_agent_openai_model::OpenAIProvider;
use owo_colors::OwoColorize;

use crate::config::GithubServer;

const GITHUB_INSTRUCTIONS: &str =
    "You are an expert on git and github. Answer questions about git and github.";
const GITHUB_PROMPTS: [&str; 2] = [
    "Who's the most frequent contributor for i-am-bee/beeai-framework?",
    "Summarize the last change in the repository for odpi/egeria.",
];
const GITHUB_WORKFLOW: &str = "Git MCP Example";

const JOKE_INSTRUCTIONS: &str = "You are a helpful assistant";
const JOKE_PROMPT: &str = "Write me a joke about the British";

const BAR_CHAR: &str = "▎";

pub async fn github(
    provider: OpenAIProvider,
    server: &GithubServer,
    runner: &Runner,
    prompts: Vec<String>,
) -> anyhow::Result<()> {
    let model = provider.config().model().to_owned();
    let session = ServerSession::start(server.server_config())
        .await
        .context("failed to start the GitHub MCP server")?;
    if let Some(info) = session.server_info() {
        info!(
            "connected to {} {}",
            info.name,
            info.version.as_deref().unwrap_or_default()
        );
    }

    let agent = AgentBuilder::with_model_provider(provider)
        .with_name("Assistant")
        .with_instructions(GITHUB_INSTRUCTIONS)
        .with_model(model)
        .with_server(Arc::clone(&session))
        .build();

    let prompts = if prompts.is_empty() {
        GITHUB_PROMPTS.iter().map(|p| (*p).to_owned()).collect()
    } else {
        prompts
    };

    let result = with_scope(GITHUB_WORKFLOW, async {
        for prompt in &prompts {
            print_prompt(prompt);
            let turn = with_spinner(runner.run(&agent, prompt.as_str())).await?;
            print_turn(&turn);
        }
        Ok::<_, RunError>(())
    })
    .await;

    session.stop().await;
    result.context("agent run failed")
}

pub async fn joke(
    provider: OpenAIProvider,
    runner: &Runner,
    prompt: Option<String>,
) -> anyhow::Result<()> {
    let model = provider.config().model().to_owned();
    let agent = AgentBuilder::with_model_provider(provider)
        .with_name("Assistant")
        .with_instructions(JOKE_INSTRUCTIONS)
        .with_model(model)
        .build();

    let prompt = prompt.unwrap_or_else(|| JOKE_PROMPT.to_owned());
    print_prompt(&prompt);
    let turn = with_spinner(runner.run(&agent, prompt.as_str()))
        .await
        .context("agent run failed")?;
    print_turn(&turn);
    Ok(())
}

async fn with_spinner<F: Future>(fut: F) -> F::Output {
    let style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(style);
    spinner.set_message("🤔 Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let output = fut.await;
    spinner.finish_and_clear();
    output
}

fn print_prompt(prompt: &str) {
    println!("\n{}", "-".repeat(40).dimmed());
    println!("{} {}", "Running:".bright_yellow(), prompt.bright_white());
}

fn print_turn(turn: &ConversationTurn) {
    for record in turn.tool_calls() {
        let server = record.server.as_deref().unwrap_or("-");
        let status = if record.result.is_success() {
            "ok".green().to_string()
        } else {
            "failed".red().to_string()
        };
        println!(
            "{}🔧 {} ({server}) {status}",
            BAR_CHAR.bright_yellow(),
            record.call.name
        );
    }
    println!(
        "{}🤖 {}",
        BAR_CHAR.bright_cyan(),
        turn.final_output().bright_white()
    );
    debug!("turn finished in {} model calls", turn.steps());
}
