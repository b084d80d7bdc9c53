use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::error::ProtocolError;
use super::frame::{self, DecodeError, Incoming, METHOD_NOT_FOUND, ResponseBody};
use super::messages::{self, CallToolResult, InitializeResult, ListToolsPage};
use crate::server::{SessionState, StateCell};
use crate::tool::{
    Error as ToolError, ToolDefinition, ToolInvocationRequest, ToolInvocationResult,
    ToolOutcome,
};

type Waiter = oneshot::Sender<ResponseBody>;

struct Shared {
    server: String,
    state: Arc<StateCell>,
    /// Lines waiting for the writer task. `None` once the client has shut
    /// down.
    outbox: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: Mutex<HashMap<u64, Waiter>>,
    next_id: AtomicU64,
    default_timeout: Duration,
}

impl Shared {
    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u64, Waiter>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_outbox(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn send_line(&self, line: String) -> Result<(), ProtocolError> {
        match self.lock_outbox().as_ref() {
            Some(tx) => tx.send(line).map_err(|_| ProtocolError::SessionClosed),
            None => Err(ProtocolError::SessionClosed),
        }
    }

    /// Stops admitting requests and fails the ones in flight. Called once
    /// either direction of the pipe is gone.
    fn close_input(&self) {
        self.state.advance(SessionState::Closing);
        self.lock_outbox().take();
        self.fail_pending();
    }

    /// Drops every waiter so their callers observe `SessionClosed`.
    fn fail_pending(&self) {
        let drained: Vec<_> = self.lock_pending().drain().collect();
        if !drained.is_empty() {
            debug!(
                "failing {} pending requests to `{}`",
                drained.len(),
                self.server
            );
        }
    }

    fn dispatch(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match frame::decode(line) {
            Ok(Incoming::Response { id, body }) => {
                let waiter = self.lock_pending().remove(&id);
                match waiter {
                    Some(waiter) => {
                        if waiter.send(body).is_err() {
                            debug!("caller of request {id} went away");
                        }
                    }
                    None => debug!(
                        "discarding response to unknown or abandoned request {id} from `{}`",
                        self.server
                    ),
                }
            }
            Ok(Incoming::Notification { method }) => {
                debug!("notification from `{}`: {method}", self.server);
            }
            Ok(Incoming::Request { id, method }) => {
                debug!("rejecting `{method}` request from `{}`", self.server);
                let reply = frame::encode_error(&id, METHOD_NOT_FOUND, "method not found");
                if self.send_line(reply).is_err() {
                    debug!("could not answer `{method}`: session closed");
                }
            }
            Err(DecodeError::NotJson) => {
                debug!("non-protocol output from `{}`: {line}", self.server);
            }
            Err(err) => {
                warn!("ignoring unrecognized frame from `{}` ({err:?}): {line}", self.server);
            }
        }
    }
}

/// Removes an abandoned request from the pending map.
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock_pending().remove(&self.id);
    }
}

/// A JSON-RPC client bound to one server's stdio.
///
/// Cloning is cheap; all clones share the same connection. Any number of
/// requests may be in flight at once.
#[derive(Clone)]
pub struct ProtocolClient {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ProtocolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolClient")
            .field("server", &self.shared.server)
            .field("state", &self.shared.state.get())
            .finish_non_exhaustive()
    }
}

impl ProtocolClient {
    /// Starts the reader and writer tasks. The returned handle belongs to
    /// the reader; it finishes when the server closes its output.
    pub(crate) fn spawn<R, W>(
        server: &str,
        reader: R,
        writer: W,
        state: Arc<StateCell>,
        default_timeout: Duration,
    ) -> (Self, JoinHandle<()>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            server: server.to_owned(),
            state,
            outbox: Mutex::new(Some(tx)),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            default_timeout,
        });

        tokio::spawn(write_loop(Arc::downgrade(&shared), writer, rx));
        let reader_task = tokio::spawn(read_loop(Arc::clone(&shared), reader));
        (Self { shared }, reader_task)
    }

    /// Returns the name of the server this client talks to.
    #[inline]
    pub fn server_name(&self) -> &str {
        &self.shared.server
    }

    /// Returns the current session state.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    /// Sends a request and waits for its response.
    ///
    /// Only admitted while the session is ready. `timeout` falls back to
    /// the session's default request timeout.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, ProtocolError> {
        let after = timeout.unwrap_or(self.shared.default_timeout);
        self.request(method, params, after, |state| state == SessionState::Ready)
            .await
    }

    /// Runs the `initialize` exchange. Admitted while starting.
    ///
    /// `after` bounds the whole exchange, independently of the default
    /// request timeout.
    pub(crate) async fn initialize(
        &self,
        client_name: &str,
        client_version: &str,
        after: Duration,
    ) -> Result<InitializeResult, ProtocolError> {
        let params = messages::initialize_params(client_name, client_version);
        let result = self
            .request("initialize", Some(params), after, |state| {
                state == SessionState::Starting
            })
            .await?;
        let result: InitializeResult = serde_json::from_value(result)
            .map_err(|err| ProtocolError::malformed(format!("initialize: {err}")))?;
        self.shared.send_line(frame::encode_notification(
            "notifications/initialized",
            None,
        ))?;
        Ok(result)
    }

    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        after: Duration,
        admit: fn(SessionState) -> bool,
    ) -> Result<Value, ProtocolError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = {
            // Checked under the lock so teardown either sees this waiter or
            // we see the new state.
            let mut pending = self.shared.lock_pending();
            let state = self.shared.state.get();
            if !admit(state) {
                return Err(ProtocolError::NotReady(state));
            }
            let (tx, rx) = oneshot::channel();
            pending.insert(id, tx);
            rx
        };
        let _guard = PendingGuard {
            shared: &self.shared,
            id,
        };

        trace!("-> `{}` #{id} {method}", self.shared.server);
        self.shared
            .send_line(frame::encode_request(id, method, params.as_ref()))?;

        let body = match tokio::time::timeout(after, rx).await {
            Ok(Ok(body)) => body,
            Ok(Err(_)) => return Err(ProtocolError::SessionClosed),
            Err(_) => {
                debug!(
                    "request #{id} ({method}) to `{}` timed out after {after:?}",
                    self.shared.server
                );
                return Err(ProtocolError::Timeout {
                    method: method.to_owned(),
                    after,
                });
            }
        };
        trace!("<- `{}` #{id}", self.shared.server);

        match body {
            ResponseBody::Result(value) => Ok(value),
            ResponseBody::Error { code, message } => {
                Err(ProtocolError::Server { code, message })
            }
            ResponseBody::Malformed(reason) => Err(ProtocolError::MalformedResponse(reason)),
        }
    }

    /// Fetches the server's tools, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ProtocolError> {
        let mut tools = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|cursor| json!({ "cursor": cursor }));
            let result = self.call("tools/list", params, None).await?;
            let page: ListToolsPage = serde_json::from_value(result)
                .map_err(|err| ProtocolError::malformed(format!("tools/list: {err}")))?;

            for tool in page.tools {
                if !seen.insert(tool.name.clone()) {
                    return Err(ProtocolError::malformed(format!(
                        "tools/list: duplicate tool `{}`",
                        tool.name
                    )));
                }
                tools.push(ToolDefinition::new(
                    tool.name,
                    tool.description.unwrap_or_default(),
                    tool.input_schema,
                ));
            }

            match page.next_cursor.filter(|next| !next.is_empty()) {
                Some(next) if cursor.as_ref() == Some(&next) => {
                    return Err(ProtocolError::malformed(format!(
                        "tools/list: cursor `{next}` repeated"
                    )));
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(tools)
    }

    /// Runs one tool.
    ///
    /// A tool that fails on the server side, either by flagging its result
    /// as an error or by answering with a JSON-RPC error, yields `Ok` with
    /// a failed outcome. `Err` is reserved for requests that got no usable
    /// answer at all.
    pub async fn invoke(
        &self,
        req: ToolInvocationRequest,
        timeout: Option<Duration>,
    ) -> Result<ToolInvocationResult, ProtocolError> {
        let params = json!({ "name": req.tool, "arguments": req.arguments });
        let outcome = match self.call("tools/call", Some(params), timeout).await {
            Ok(result) => {
                let result: CallToolResult = serde_json::from_value(result)
                    .map_err(|err| ProtocolError::malformed(format!("tools/call: {err}")))?;
                call_outcome(result)
            }
            Err(ProtocolError::Server { code, message }) => ToolOutcome::Failure(
                ToolError::execution_error().with_reason(format!("{message} (code {code})")),
            ),
            Err(err) => return Err(err),
        };
        Ok(ToolInvocationResult {
            call_id: req.call_id,
            outcome,
        })
    }

    /// Fails every pending request and stops writing. The server sees end
    /// of input once queued lines are flushed.
    pub(crate) fn shutdown(&self) {
        self.shared.lock_outbox().take();
        self.shared.fail_pending();
    }
}

fn call_outcome(result: CallToolResult) -> ToolOutcome {
    if result.is_error {
        let reason = match &result.structured_content {
            Some(structured) => structured.to_string(),
            None => result.text(),
        };
        return ToolOutcome::Failure(ToolError::execution_error().with_reason(reason));
    }
    match result.structured_content {
        Some(structured) => ToolOutcome::Success(structured),
        None => ToolOutcome::Success(Value::String(result.text())),
    }
}

async fn write_loop<W>(
    shared: Weak<Shared>,
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<String>,
)
where
    W: AsyncWrite + Send + Unpin,
{
    while let Some(line) = rx.recv().await {
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        };
        if let Err(err) = written.await {
            // Nothing written from here on can be answered.
            if let Some(shared) = shared.upgrade() {
                warn!("failed to write to `{}`: {err}", shared.server);
                shared.close_input();
            }
            return;
        }
    }
    if let Err(err) = writer.shutdown().await {
        debug!("closing server input: {err}");
    }
}

async fn read_loop<R>(shared: Arc<Shared>, reader: R)
where
    R: AsyncRead + Send + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("`{}` closed its output", shared.server);
                break;
            }
            Ok(_) => match std::str::from_utf8(&buf) {
                Ok(line) => shared.dispatch(line),
                Err(err) => debug!(
                    "skipping undecodable output from `{}` ({err}): {}",
                    shared.server,
                    String::from_utf8_lossy(&buf).trim_end()
                ),
            },
            Err(err) => {
                warn!("failed to read from `{}`: {err}", shared.server);
                break;
            }
        }
    }
    shared.close_input();
    shared.state.advance(SessionState::Closed);
}
