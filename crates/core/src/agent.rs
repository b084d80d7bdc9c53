mod builder;

use std::sync::Arc;

pub use builder::AgentBuilder;

use crate::model_client::ModelClient;
use crate::server::ServerSession;

pub(crate) struct AgentConfig {
    pub name: String,
    pub instructions: String,
    pub model: Option<String>,
    pub model_client: ModelClient,
    pub servers: Vec<Arc<ServerSession>>,
}

/// An immutable bundle of instructions, model and tool servers.
///
/// Agents hold no conversation state; hand one to a
/// [`Runner`](crate::Runner) to run a turn. Cloning is cheap. The attached
/// servers are shared, not owned: stopping them is up to whoever started
/// them.
#[derive(Clone)]
pub struct Agent {
    pub(crate) inner: Arc<AgentConfig>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let servers: Vec<_> = self.inner.servers.iter().map(|s| s.name()).collect();
        f.debug_struct("Agent")
            .field("name", &self.inner.name)
            .field("model", &self.inner.model)
            .field("servers", &servers)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Returns the agent name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the system instructions.
    #[inline]
    pub fn instructions(&self) -> &str {
        &self.inner.instructions
    }

    /// Returns the model override, if any.
    #[inline]
    pub fn model(&self) -> Option<&str> {
        self.inner.model.as_deref()
    }

    /// Returns the attached tool servers.
    #[inline]
    pub fn servers(&self) -> &[Arc<ServerSession>] {
        &self.inner.servers
    }
}
