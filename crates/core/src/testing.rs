//! An in-process tool server speaking line-delimited JSON-RPC over a
//! duplex pipe.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, WriteHalf};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::server::{LaunchError, ServerConfig, ServerConfigBuilder, ServerSession};

type Handler = Arc<dyn Fn(&str, &Value) -> FakeReply + Send + Sync>;
type SharedWriter = Arc<AsyncMutex<WriteHalf<DuplexStream>>>;

/// How the fake server answers one request.
pub enum FakeReply {
    Ok(Value),
    /// A `tools/call` result flagged with `isError`.
    ToolError(String),
    RpcError(i64, String),
    /// Never answers.
    Silent,
    Delayed(Duration, Box<FakeReply>),
}

impl FakeReply {
    pub fn delayed(millis: u64, reply: FakeReply) -> Self {
        Self::Delayed(Duration::from_millis(millis), Box::new(reply))
    }
}

pub struct FakeServer {
    tools: Vec<Value>,
    handler: Handler,
    page_size: Option<usize>,
    answer_handshake: bool,
    handshake_delay: Duration,
    /// Written right after the `initialize` response.
    handshake_noise: Option<&'static [u8]>,
}

pub struct FakeHandle {
    list_calls: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<Value>>>,
    writer: SharedWriter,
    task: JoinHandle<()>,
}

impl FakeHandle {
    /// Number of `tools/list` requests served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Every JSON message the server received, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Writes a raw line to the client, as if the server sent it.
    pub async fn send_raw(&self, line: &str) {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
    }

    /// Writes raw bytes to the client, newline included or not.
    pub async fn send_bytes(&self, bytes: &[u8]) {
        self.writer.lock().await.write_all(bytes).await.unwrap();
    }

    /// Simulates the server process exiting.
    pub async fn disconnect(&self) {
        self.task.abort();
        self.writer.lock().await.shutdown().await.ok();
    }
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            tools: vec![],
            handler: Arc::new(|name: &str, _: &Value| {
                FakeReply::RpcError(-32602, format!("unknown tool `{name}`"))
            }),
            page_size: None,
            answer_handshake: true,
            handshake_delay: Duration::ZERO,
            handshake_noise: None,
        }
    }

    pub fn with_tool(mut self, name: &str, input_schema: Value) -> Self {
        self.tools.push(json!({
            "name": name,
            "description": format!("The {name} tool."),
            "inputSchema": input_schema,
        }));
        self
    }

    pub fn on_call<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &Value) -> FakeReply + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn ignore_handshake(mut self) -> Self {
        self.answer_handshake = false;
        self
    }

    pub fn handshake_delay(mut self, millis: u64) -> Self {
        self.handshake_delay = Duration::from_millis(millis);
        self
    }

    pub fn handshake_noise(mut self, bytes: &'static [u8]) -> Self {
        self.handshake_noise = Some(bytes);
        self
    }

    pub async fn connect(
        self,
        config: ServerConfig,
    ) -> (Result<Arc<ServerSession>, LaunchError>, FakeHandle) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);

        let list_calls = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(vec![]));
        let writer = Arc::new(AsyncMutex::new(server_write));
        let task = tokio::spawn(self.serve(
            server_read,
            Arc::clone(&writer),
            Arc::clone(&list_calls),
            Arc::clone(&received),
        ));
        let handle = FakeHandle {
            list_calls,
            received,
            writer,
            task,
        };

        let session =
            ServerSession::connect(config, client_read, client_write, None, vec![]).await;
        (session, handle)
    }

    async fn serve(
        self,
        reader: tokio::io::ReadHalf<DuplexStream>,
        writer: SharedWriter,
        list_calls: Arc<AtomicUsize>,
        received: Arc<Mutex<Vec<Value>>>,
    ) {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(msg) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            received.lock().unwrap().push(msg.clone());

            let Some(id) = msg.get("id").cloned() else {
                continue;
            };
            let Some(method) = msg.get("method").and_then(Value::as_str) else {
                continue;
            };
            let params = msg.get("params").cloned().unwrap_or(Value::Null);
            let reply = match method {
                "initialize" if self.answer_handshake => {
                    let reply = FakeReply::Ok(json!({
                        "protocolVersion": "2024-11-05",
                        "capabilities": { "tools": {} },
                        "serverInfo": { "name": "fake-server", "version": "0.1.0" },
                    }));
                    respond(
                        FakeReply::Delayed(self.handshake_delay, Box::new(reply)),
                        id,
                        Arc::clone(&writer),
                    )
                    .await;
                    if let Some(noise) = self.handshake_noise {
                        writer.lock().await.write_all(noise).await.ok();
                    }
                    continue;
                }
                "initialize" => FakeReply::Silent,
                "tools/list" => {
                    list_calls.fetch_add(1, Ordering::SeqCst);
                    self.list_page(&params)
                }
                "tools/call" => {
                    let name = params["name"].as_str().unwrap_or_default();
                    (self.handler)(name, &params["arguments"])
                }
                _ => FakeReply::RpcError(-32601, "method not found".to_owned()),
            };
            tokio::spawn(respond(reply, id, Arc::clone(&writer)));
        }
    }

    fn list_page(&self, params: &Value) -> FakeReply {
        let Some(size) = self.page_size else {
            return FakeReply::Ok(json!({ "tools": self.tools }));
        };
        let start: usize = params["cursor"]
            .as_str()
            .and_then(|cursor| cursor.parse().ok())
            .unwrap_or(0);
        let end = (start + size).min(self.tools.len());
        let tools = &self.tools[start..end];
        let mut page = json!({ "tools": tools });
        if end < self.tools.len() {
            page["nextCursor"] = json!(end.to_string());
        }
        FakeReply::Ok(page)
    }
}

async fn respond(mut reply: FakeReply, id: Value, writer: SharedWriter) {
    let frame = loop {
        match reply {
            FakeReply::Delayed(after, inner) => {
                tokio::time::sleep(after).await;
                reply = *inner;
            }
            FakeReply::Silent => return,
            FakeReply::Ok(result) => {
                break json!({ "jsonrpc": "2.0", "id": id, "result": result });
            }
            FakeReply::ToolError(text) => {
                break json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "content": [{ "type": "text", "text": text }],
                        "isError": true,
                    },
                });
            }
            FakeReply::RpcError(code, message) => {
                break json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": code, "message": message },
                });
            }
        }
    };
    let mut line = frame.to_string();
    line.push('\n');
    let mut writer = writer.lock().await;
    // The client may be gone already.
    writer.write_all(line.as_bytes()).await.ok();
}

pub fn fake_config(name: &str) -> ServerConfig {
    ServerConfigBuilder::new(name, "fake-server")
        .startup_timeout(Duration::from_secs(2))
        .request_timeout(Duration::from_secs(5))
        .shutdown_timeout(Duration::from_millis(100))
        .build()
}

/// Connects to a fake server and expects the handshake to succeed.
pub async fn fake_session(
    name: &str,
    server: FakeServer,
) -> (Arc<ServerSession>, FakeHandle) {
    let (session, handle) = server.connect(fake_config(name)).await;
    (session.unwrap(), handle)
}
