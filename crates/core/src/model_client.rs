use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use mcp_agent_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, OpaqueMessage, ToolCallRequest,
};
use thiserror::Error;
use tracing::Instrument;

type SendRequestResult = Result<ModelReply, ModelError>;
type BoxedSendRequestFuture = Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn = Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A failed model request.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ModelError {
    kind: ErrorKind,
    message: String,
}

impl ModelError {
    fn from_provider<E: ModelProviderError>(err: &E) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Returns the error category reported by the provider.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the provider's error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Type-erased handle to a model provider.
#[derive(Clone)]
pub(crate) struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // Erase `P` so agents don't carry the provider type around.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("sending model request: {req:?}");
                    let resp_or_err = fut.await;
                    collect_response::<P>(resp_or_err).await
                }
                .instrument(trace_span!("model request")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and waits for the whole response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming when the
    /// future is dropped.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req).await
    }
}

/// A fully received model response.
#[derive(Clone, Debug)]
pub(crate) struct ModelReply {
    pub text: String,
    pub opaque_msg: Option<OpaqueMessage>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<ModelFinishReason>,
}

async fn collect_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("model request failed: {err}");
            return Err(ModelError::from_provider(&err));
        }
    };

    let mut text = String::new();
    let opaque_msg;
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

    let mut pinned_resp = pin!(resp);
    loop {
        let event = match poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await {
            Ok(event) => event,
            Err(err) => {
                error!("model response failed: {err}");
                return Err(ModelError::from_provider(&err));
            }
        };

        let Some(event) = event else {
            opaque_msg = pinned_resp.make_opaque_message();
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => text.push_str(&delta),
            ModelResponseEvent::ToolCall(call) => tool_calls.push(call),
            ModelResponseEvent::Completed(reason) => finish_reason = Some(reason),
        }
    }

    Ok(ModelReply {
        text,
        opaque_msg,
        tool_calls,
        finish_reason,
    })
}
