use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use super::ToolDefinition;
use crate::protocol::{ProtocolClient, ProtocolError};
use crate::server::SessionState;

/// Per-session memo of `tools/list`.
///
/// Concurrent callers on a cold cache share one discovery: the first one
/// queries while the rest wait on `gate` and then read its result.
#[derive(Debug)]
pub(crate) struct ToolCache {
    enabled: bool,
    cached: Mutex<Option<Arc<[ToolDefinition]>>>,
    gate: AsyncMutex<()>,
}

impl ToolCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            cached: Mutex::new(None),
            gate: AsyncMutex::new(()),
        }
    }

    pub async fn get_or_discover(
        &self,
        client: &ProtocolClient,
    ) -> Result<Arc<[ToolDefinition]>, ProtocolError> {
        let state = client.state();
        if state != SessionState::Ready {
            self.invalidate();
            return Err(ProtocolError::NotReady(state));
        }
        if !self.enabled {
            return client.list_tools().await.map(Arc::from);
        }
        if let Some(tools) = self.peek() {
            return Ok(tools);
        }

        let _gate = self.gate.lock().await;
        if let Some(tools) = self.peek() {
            return Ok(tools);
        }
        let tools: Arc<[ToolDefinition]> = client.list_tools().await?.into();
        debug!(
            "cached {} tools from `{}`",
            tools.len(),
            client.server_name()
        );
        // A shutdown racing with discovery must not leave a stale entry.
        if client.state() == SessionState::Ready {
            *self.lock() = Some(Arc::clone(&tools));
        }
        Ok(tools)
    }

    pub fn invalidate(&self) {
        self.lock().take();
    }

    fn peek(&self) -> Option<Arc<[ToolDefinition]>> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<[ToolDefinition]>>> {
        self.cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
