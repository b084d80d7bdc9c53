//! Tool server sessions.
//!
//! A [`ServerSession`] owns one server subprocess from spawn to exit:
//!
//! ```text
//! Starting --handshake--> Ready --stop / EOF--> Closing ---> Closed
//!     \___________ launch failure ___________________________/
//! ```
//!
//! Requests are only admitted while `Ready`. Once shut down a session is
//! never reused; start a new one instead.

mod config;
mod error;
mod state;
mod supervisor;
#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use config::{DEFAULT_INHERITED_ENV, ServerConfig, ServerConfigBuilder};
pub use error::LaunchError;
pub use state::SessionState;
pub(crate) use state::StateCell;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::protocol::{InitializeResult, ProtocolClient, ProtocolError};
use crate::tool::{ToolCache, ToolDefinition, ToolInvocationRequest, ToolInvocationResult};

const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the server reported about itself during the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerInfo {
    /// Implementation name.
    pub name: String,
    /// Implementation version, if reported.
    pub version: Option<String>,
    /// Negotiated protocol revision, if reported.
    pub protocol_version: Option<String>,
}

impl ServerInfo {
    fn from_handshake(result: InitializeResult) -> Option<Self> {
        let info = result.server_info?;
        Some(Self {
            name: info.name,
            version: info.version,
            protocol_version: result.protocol_version,
        })
    }
}

/// A running tool server.
pub struct ServerSession {
    config: ServerConfig,
    state: Arc<StateCell>,
    client: ProtocolClient,
    tools: ToolCache,
    server_info: Option<ServerInfo>,
    process: AsyncMutex<Option<Child>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for ServerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSession")
            .field("name", &self.config.name)
            .field("state", &self.state.get())
            .field("server_info", &self.server_info)
            .finish_non_exhaustive()
    }
}

impl ServerSession {
    /// Spawns the server and completes the handshake.
    ///
    /// On success the session is `Ready`. On failure the process has been
    /// killed and nothing is left behind.
    pub async fn start(config: ServerConfig) -> Result<Arc<Self>, LaunchError> {
        let mut child = supervisor::spawn(&config)?;
        let stdin = child.stdin.take().ok_or(LaunchError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(LaunchError::MissingPipe("stdout"))?;
        let mut tasks = Vec::with_capacity(2);
        if let Some(stderr) = child.stderr.take() {
            tasks.push(supervisor::drain_stderr(config.name.clone(), stderr));
        }
        Self::connect(config, stdout, stdin, Some(child), tasks).await
    }

    /// Runs the handshake over an already established byte stream.
    pub(crate) async fn connect<R, W>(
        config: ServerConfig,
        reader: R,
        writer: W,
        child: Option<Child>,
        mut tasks: Vec<JoinHandle<()>>,
    ) -> Result<Arc<Self>, LaunchError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let state = Arc::new(StateCell::new());
        let (client, reader_task) = ProtocolClient::spawn(
            &config.name,
            reader,
            writer,
            Arc::clone(&state),
            config.request_timeout,
        );
        tasks.push(reader_task);

        let result = client
            .initialize(CLIENT_NAME, CLIENT_VERSION, config.startup_timeout)
            .await
            .map_err(|err| match err {
                ProtocolError::Timeout { .. } => LaunchError::HandshakeTimeout {
                    name: config.name.clone(),
                    after: config.startup_timeout,
                },
                source => LaunchError::Handshake {
                    name: config.name.clone(),
                    source,
                },
            });
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                warn!("{err}");
                state.advance(SessionState::Closing);
                client.shutdown();
                if let Some(mut child) = child {
                    if let Err(err) = child.kill().await {
                        debug!("killing `{}`: {err}", config.name);
                    }
                }
                for task in tasks {
                    task.abort();
                }
                state.advance(SessionState::Closed);
                return Err(err);
            }
        };

        let server_info = ServerInfo::from_handshake(result);
        // The server may have hung up right after answering.
        if !state.advance(SessionState::Ready) {
            return Err(LaunchError::Handshake {
                name: config.name.clone(),
                source: ProtocolError::SessionClosed,
            });
        }
        info!(
            "tool server `{}` ready ({})",
            config.name,
            server_info
                .as_ref()
                .map(|info| info.name.as_str())
                .unwrap_or("unknown implementation")
        );

        Ok(Arc::new(Self {
            tools: ToolCache::new(config.cache_tools_list),
            config,
            state,
            client,
            server_info,
            process: AsyncMutex::new(child),
            tasks: Mutex::new(tasks),
        }))
    }

    /// Returns the configured server name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the current lifecycle state.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Returns what the server said about itself in the handshake.
    #[inline]
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Returns the protocol client, for requests beyond tools.
    #[inline]
    pub fn client(&self) -> &ProtocolClient {
        &self.client
    }

    /// Returns the server's tools, from the cache when enabled.
    pub async fn list_tools(&self) -> Result<Arc<[ToolDefinition]>, ProtocolError> {
        self.tools.get_or_discover(&self.client).await
    }

    /// Forgets cached tools so the next listing queries the server.
    pub fn invalidate_tools(&self) {
        self.tools.invalidate();
    }

    /// Runs one tool. See [`ProtocolClient::invoke`].
    pub async fn invoke(
        &self,
        req: ToolInvocationRequest,
        timeout: Option<Duration>,
    ) -> Result<ToolInvocationResult, ProtocolError> {
        self.client.invoke(req, timeout).await
    }

    /// Shuts the session down.
    ///
    /// Pending requests fail, stdin is closed and the process gets the
    /// configured grace period to exit before it is killed. Safe to call
    /// more than once and from several tasks; every caller returns once
    /// the session is closed.
    pub async fn stop(&self) {
        if self.state.advance(SessionState::Closing) {
            debug!("stopping tool server `{}`", self.config.name);
        }
        self.tools.invalidate();
        self.client.shutdown();

        let mut process = self.process.lock().await;
        if let Some(mut child) = process.take() {
            let grace = self.config.shutdown_timeout;
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => debug!("`{}` exited with {status}", self.config.name),
                Ok(Err(err)) => warn!("waiting for `{}`: {err}", self.config.name),
                Err(_) => {
                    warn!(
                        "`{}` did not exit within {grace:?}, killing it",
                        self.config.name
                    );
                    if let Err(err) = child.kill().await {
                        warn!("killing `{}`: {err}", self.config.name);
                    }
                }
            }
        }
        drop(process);

        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
        self.state.advance(SessionState::Closed);
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        // The child itself is killed on drop.
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }
}
