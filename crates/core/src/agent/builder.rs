use std::sync::Arc;

use mcp_agent_model::ModelProvider;

use super::Agent;
use crate::model_client::ModelClient;
use crate::server::ServerSession;

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    name: String,
    instructions: String,
    model: Option<String>,
    servers: Vec<Arc<ServerSession>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(provider: P) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            name: "Agent".to_owned(),
            instructions: String::new(),
            model: None,
            servers: vec![],
        }
    }

    /// Sets the agent name used in traces and logs.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the system instructions.
    #[inline]
    pub fn with_instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Overrides the provider's default model.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Attaches a tool server. Servers are consulted in attachment order.
    #[inline]
    pub fn with_server(mut self, server: Arc<ServerSession>) -> Self {
        self.servers.push(server);
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent {
            inner: Arc::new(super::AgentConfig {
                name: self.name,
                instructions: self.instructions,
                model: self.model,
                model_client: self.model_client,
                servers: self.servers,
            }),
        }
    }
}
