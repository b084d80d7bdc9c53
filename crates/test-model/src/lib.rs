//! A scripted fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use mcp_agent_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, OpaqueMessage,
    ToolCallRequest,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// The history message produced by a [`TestModelResponse`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptedMessage {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

pub struct TestModelResponse {
    message_id: String,
    message: ScriptedMessage,
    events: VecDeque<ModelResponseEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TestModelResponse {
    fn new(index: usize, preset: PresetResponse, delay: Duration) -> Self {
        let mut message = ScriptedMessage {
            text: String::new(),
            tool_calls: vec![],
        };
        let finish_reason = if preset.has_tool_call() {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        };
        let mut events = VecDeque::with_capacity(preset.events.len() + 1);
        for event in preset.events {
            match event {
                PresetEvent::MessageDelta(delta) => {
                    message.text.push_str(&delta);
                    events.push_back(ModelResponseEvent::MessageDelta(delta));
                }
                PresetEvent::ToolCall(req) => {
                    message.tool_calls.push(req.clone());
                    events.push_back(ModelResponseEvent::ToolCall(req));
                }
            }
        }
        events.push_back(ModelResponseEvent::Completed(finish_reason));
        Self {
            message_id: format!("msg:{index}"),
            message,
            events,
            delay,
            sleep: None,
        }
    }
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.events.is_empty() {
            return Poll::Ready(Ok(None));
        }
        let delay = this.delay;
        let sleep = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;
        Poll::Ready(Ok(this.events.pop_front()))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        Some(OpaqueMessage::new(&self.message_id, self.message.clone()))
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    repeat_last: bool,
    requests: Vec<ModelRequest>,
}

/// A scripted fake model.
///
/// Responses are served in the order they were added, one per request,
/// regardless of what the request contains. Every request is recorded so
/// tests can inspect what the runner sent. Clones share the same script.
///
/// # Note
///
/// This type clones requests and responses freely. Use it for tests only.
#[derive(Clone)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Duration,
}

impl Default for TestModelProvider {
    fn default() -> Self {
        Self {
            script: Default::default(),
            delay: Duration::from_millis(1),
        }
    }
}

impl TestModelProvider {
    /// Appends a response to the script.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().responses.push_back(preset);
    }

    /// Keeps serving the last response once the script reaches it.
    #[inline]
    pub fn repeat_last_response(&mut self, repeat: bool) {
        self.lock().repeat_last = repeat;
    }

    /// Sets the delay between two streamed events.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = duration;
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Returns a copy of every request received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn next_response(&self, req: &ModelRequest) -> Result<TestModelResponse, Error> {
        let mut script = self.lock();
        script.requests.push(req.clone());
        let index = script.requests.len();
        let repeat = script.repeat_last && script.responses.len() == 1;

        let Some(front) = script.responses.front_mut() else {
            return Err(Error {
                message: "script exhausted",
                kind: ErrorKind::Other,
            });
        };
        match front.failures {
            Some(0) => {
                return Err(Error {
                    message: "scripted permanent failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            Some(ref mut remaining) => {
                *remaining -= 1;
                if *remaining == 0 {
                    front.failures = None;
                }
                return Err(Error {
                    message: "scripted failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            None => {}
        }

        let preset = if repeat {
            front.clone()
        } else {
            let Some(preset) = script.responses.pop_front() else {
                unreachable!("front checked above");
            };
            preset
        };
        Ok(TestModelResponse::new(index, preset, self.delay))
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.next_response(req))
    }
}
