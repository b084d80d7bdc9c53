//! Tools discovered from tool servers and the types for invoking them.

mod cache;
mod error;
mod schema;

use mcp_agent_model::ModelTool;
use serde_json::Value;

pub(crate) use cache::ToolCache;
pub use error::{Error, ErrorKind};
use schema::ArgumentShape;

/// A tool as advertised by a server's `tools/list`.
#[derive(Clone, Debug)]
pub struct ToolDefinition {
    name: String,
    description: String,
    input_schema: Value,
    shape: ArgumentShape,
}

impl ToolDefinition {
    /// Creates a definition. A missing or non-object schema is treated as
    /// an empty object schema.
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        let input_schema = if input_schema.is_object() {
            input_schema
        } else {
            serde_json::json!({ "type": "object", "properties": {} })
        };
        let shape = ArgumentShape::compile(&input_schema);
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            shape,
        }
    }

    /// Returns the tool name, unique within its server.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the human-readable description.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the JSON Schema describing the tool's arguments.
    #[inline]
    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Checks `arguments` against the top level of the input schema.
    pub fn validate(&self, arguments: &Value) -> Result<(), Error> {
        self.shape
            .validate(arguments)
            .map_err(|reason| Error::invalid_input().with_reason(reason))
    }

    /// Describes this tool to the model.
    pub fn to_model_tool(&self) -> ModelTool {
        ModelTool {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }
}

/// A request to run one tool.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocationRequest {
    /// Correlates the result with the model's tool call.
    pub call_id: String,
    /// Name of the tool to run.
    pub tool: String,
    /// Arguments, a JSON object.
    pub arguments: Value,
}

/// What came back from running a tool.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocationResult {
    /// Echoes [`ToolInvocationRequest::call_id`].
    pub call_id: String,
    /// Payload or failure.
    pub outcome: ToolOutcome,
}

/// Success payload or failure of a tool invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    /// The tool succeeded. Structured output when the server gave any,
    /// otherwise its text output as a JSON string.
    Success(Value),
    /// The tool failed.
    Failure(Error),
}

impl ToolInvocationResult {
    /// Creates a failed result.
    pub fn failure<S: Into<String>>(call_id: S, error: Error) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Failure(error),
        }
    }

    /// Returns `true` if the tool succeeded.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    /// Renders the result as the content of a tool message.
    pub fn to_model_content(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success(Value::String(text)) => text.clone(),
            ToolOutcome::Success(value) => value.to_string(),
            ToolOutcome::Failure(err) => format!("Error: {}", err.reason()),
        }
    }
}
