use serde_json::Value;

use crate::OpaqueMessage;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// Model identifier to use for this request. Providers fall back to
    /// their configured default when this is `None`.
    pub model: Option<String>,
    /// The input messages.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
    /// A tool call result.
    Tool(ToolCallResult),
    /// An opaque message (usually the history message from the model)
    Opaque(OpaqueMessage),
}

/// The result of calling a tool, as fed back to the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallResult {
    /// The id of the tool call request this result answers.
    pub id: String,
    /// The result of the tool call.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool, as a
    /// [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}
