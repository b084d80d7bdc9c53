//! Drives a conversation turn.
//!
//! A turn alternates between the model and the agent's tools:
//!
//! ```text
//! Dispatched -> AwaitingModel -> (ToolCallRequested -> AwaitingToolResult -> AwaitingModel)* -> Completed | Failed
//! ```
//!
//! All tool calls from one model response are dispatched concurrently and
//! joined before the next model call. Their results are fed back in the
//! order the model requested them.

mod catalog;
mod error;

use std::time::Duration;

use futures_util::future::join_all;
use mcp_agent_model::{
    ModelFinishReason, ModelMessage, ModelRequest, ToolCallRequest, ToolCallResult,
};
use serde_json::{Map, Value};

use crate::agent::Agent;
use crate::conversation::{ConversationTurn, ToolCallRecord};
use crate::model_client::ModelReply;
use crate::tool::{Error as ToolError, ToolInvocationRequest, ToolInvocationResult};
use crate::trace;
use catalog::Catalog;
pub use error::RunError;

const DEFAULT_MAX_STEPS: usize = 10;
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Limits applied to every turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Maximum number of model calls in one turn.
    pub max_steps: usize,
    /// Timeout for each tool invocation.
    pub tool_timeout: Duration,
    /// Timeout for each model call, streaming included.
    pub model_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }
}

/// Runs turns for any number of agents.
#[derive(Clone, Debug, Default)]
pub struct Runner {
    config: RunConfig,
}

impl Runner {
    /// Creates a runner with the given limits.
    #[inline]
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Returns the limits.
    #[inline]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs one turn starting from `input`, with no prior history.
    pub async fn run<S: Into<String>>(
        &self,
        agent: &Agent,
        input: S,
    ) -> Result<ConversationTurn, RunError> {
        self.run_with_history(agent, vec![], input).await
    }

    /// Runs one turn that continues `history`, usually
    /// [`ConversationTurn::to_history`] of the previous turn.
    pub async fn run_with_history<S: Into<String>>(
        &self,
        agent: &Agent,
        history: Vec<ModelMessage>,
        input: S,
    ) -> Result<ConversationTurn, RunError> {
        let scope = format!("{} turn", agent.name());
        trace::with_scope(&scope, self.run_turn(agent, history, input.into())).await
    }

    async fn run_turn(
        &self,
        agent: &Agent,
        history: Vec<ModelMessage>,
        input: String,
    ) -> Result<ConversationTurn, RunError> {
        let catalog = Catalog::discover(agent.servers()).await?;
        debug!(
            "agent `{}` starts a turn with {} tools",
            agent.name(),
            catalog.model_tools().len()
        );

        let mut messages = Vec::with_capacity(history.len() + 2);
        if !agent.instructions().is_empty() {
            messages.push(ModelMessage::System(agent.instructions().to_owned()));
        }
        messages.extend(history);
        messages.push(ModelMessage::User(input.clone()));

        let mut tool_calls = Vec::new();
        let mut steps = 0;
        loop {
            if steps == self.config.max_steps {
                warn!(
                    "agent `{}` hit the step limit of {}",
                    agent.name(),
                    self.config.max_steps
                );
                return Err(RunError::StepLimitExceeded {
                    max_steps: self.config.max_steps,
                });
            }
            steps += 1;

            let req = ModelRequest {
                model: agent.model().map(str::to_owned),
                messages: messages.clone(),
                tools: catalog.model_tools().to_vec(),
            };
            let reply = trace::with_scope("model call", self.call_model(agent, req)).await?;
            trace!("model reply at step {steps}: {reply:?}");

            match reply.opaque_msg {
                Some(msg) => messages.push(ModelMessage::Opaque(msg)),
                None => messages.push(ModelMessage::Assistant(reply.text.clone())),
            }

            if reply.tool_calls.is_empty() {
                if reply.finish_reason == Some(ModelFinishReason::ToolCalls) {
                    warn!("model stopped for tool calls but sent none, ending the turn");
                }
                return Ok(ConversationTurn {
                    input,
                    tool_calls,
                    final_output: reply.text,
                    messages,
                    steps,
                });
            }

            let results = join_all(
                reply
                    .tool_calls
                    .iter()
                    .map(|call| self.dispatch(&catalog, call)),
            )
            .await;
            for (call, result) in reply.tool_calls.into_iter().zip(results) {
                let (server, result) = result?;
                messages.push(ModelMessage::Tool(ToolCallResult {
                    id: call.id.clone(),
                    content: result.to_model_content(),
                }));
                tool_calls.push(ToolCallRecord {
                    call,
                    server,
                    result,
                });
            }
        }
    }

    async fn call_model(&self, agent: &Agent, req: ModelRequest) -> Result<ModelReply, RunError> {
        let after = self.config.model_timeout;
        match tokio::time::timeout(after, agent.inner.model_client.send_request(req)).await {
            Ok(reply) => Ok(reply?),
            Err(_) => Err(RunError::ModelTimeout(after)),
        }
    }

    /// Runs one requested tool call. Returns the server that ran it, if
    /// any, and its result.
    async fn dispatch(
        &self,
        catalog: &Catalog,
        call: &ToolCallRequest,
    ) -> Result<(Option<String>, ToolInvocationResult), RunError> {
        let Some(entry) = catalog.get(&call.name) else {
            warn!("model requested unknown tool `{}`", call.name);
            let err = ToolError::unknown_tool().with_reason(format!("no tool named `{}`", call.name));
            return Ok((None, ToolInvocationResult::failure(&call.id, err)));
        };

        let arguments = match &call.arguments {
            Value::Null => Value::Object(Map::new()),
            arguments => arguments.clone(),
        };
        if let Err(err) = entry.tool.validate(&arguments) {
            debug!("rejecting call to `{}`: {err}", call.name);
            return Ok((None, ToolInvocationResult::failure(&call.id, err)));
        }

        let server = &entry.server;
        let req = ToolInvocationRequest {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            arguments,
        };
        let scope = format!("tool {}", call.name);
        let invoked =
            trace::with_scope(&scope, server.invoke(req, Some(self.config.tool_timeout))).await;
        match invoked {
            Ok(result) => Ok((Some(server.name().to_owned()), result)),
            Err(_) if server.state().is_shut_down() => Err(RunError::SessionUnavailable {
                server: server.name().to_owned(),
            }),
            Err(err) => {
                warn!("tool `{}` on `{}` failed: {err}", call.name, server.name());
                let err = ToolError::unavailable().with_reason(err.to_string());
                Ok((
                    Some(server.name().to_owned()),
                    ToolInvocationResult::failure(&call.id, err),
                ))
            }
        }
    }
}
