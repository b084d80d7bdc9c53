//! The record of one conversation turn.

use mcp_agent_model::{ModelMessage, ToolCallRequest};

use crate::tool::ToolInvocationResult;

/// One tool call the model made during a turn, with its result.
#[derive(Clone, Debug)]
pub struct ToolCallRecord {
    /// The call as requested by the model.
    pub call: ToolCallRequest,
    /// The server that ran the tool. `None` when the call was rejected
    /// before dispatch.
    pub server: Option<String>,
    /// What came back.
    pub result: ToolInvocationResult,
}

/// The outcome of [`Runner::run`](crate::Runner::run).
#[derive(Clone, Debug)]
pub struct ConversationTurn {
    pub(crate) input: String,
    pub(crate) tool_calls: Vec<ToolCallRecord>,
    pub(crate) final_output: String,
    pub(crate) messages: Vec<ModelMessage>,
    pub(crate) steps: usize,
}

impl ConversationTurn {
    /// Returns the user input that started the turn.
    #[inline]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns the tool calls in the order the model requested them.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    /// Returns the model's final answer.
    #[inline]
    pub fn final_output(&self) -> &str {
        &self.final_output
    }

    /// Returns the number of model calls the turn took.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Returns every message sent to or received from the model, starting
    /// with the system instructions.
    #[inline]
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    /// Returns the messages to pass to
    /// [`Runner::run_with_history`](crate::Runner::run_with_history) for a
    /// follow-up turn. The system instructions are left out; the runner
    /// adds the agent's own.
    pub fn to_history(&self) -> Vec<ModelMessage> {
        self.messages
            .iter()
            .filter(|msg| !matches!(msg, ModelMessage::System(_)))
            .cloned()
            .collect()
    }
}
