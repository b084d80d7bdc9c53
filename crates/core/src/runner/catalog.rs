use std::collections::HashMap;
use std::sync::Arc;

use mcp_agent_model::ModelTool;

use super::RunError;
use crate::protocol::ProtocolError;
use crate::server::ServerSession;
use crate::tool::ToolDefinition;

pub(crate) struct CatalogEntry {
    pub server: Arc<ServerSession>,
    pub tool: ToolDefinition,
}

/// Every tool reachable by an agent, keyed by name.
pub(crate) struct Catalog {
    entries: HashMap<String, CatalogEntry>,
    model_tools: Vec<ModelTool>,
}

impl Catalog {
    pub async fn discover(servers: &[Arc<ServerSession>]) -> Result<Self, RunError> {
        let mut entries: HashMap<String, CatalogEntry> = HashMap::new();
        let mut model_tools = Vec::new();

        for server in servers {
            let tools = server
                .list_tools()
                .await
                .map_err(|err| discovery_error(server, err))?;
            for tool in tools.iter() {
                if let Some(existing) = entries.get(tool.name()) {
                    return Err(RunError::DuplicateTool {
                        tool: tool.name().to_owned(),
                        first: existing.server.name().to_owned(),
                        second: server.name().to_owned(),
                    });
                }
                model_tools.push(tool.to_model_tool());
                entries.insert(
                    tool.name().to_owned(),
                    CatalogEntry {
                        server: Arc::clone(server),
                        tool: tool.clone(),
                    },
                );
            }
        }

        Ok(Self {
            entries,
            model_tools,
        })
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    /// Tools in server attachment order, then listing order.
    #[inline]
    pub fn model_tools(&self) -> &[ModelTool] {
        &self.model_tools
    }
}

fn discovery_error(server: &ServerSession, err: ProtocolError) -> RunError {
    match err {
        ProtocolError::NotReady(_) | ProtocolError::SessionClosed => {
            RunError::SessionUnavailable {
                server: server.name().to_owned(),
            }
        }
        _ if server.state().is_shut_down() => RunError::SessionUnavailable {
            server: server.name().to_owned(),
        },
        source => RunError::ToolDiscovery {
            server: server.name().to_owned(),
            source,
        },
    }
}
