use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpaqueMessage;
use crate::error::ModelProviderError;

/// A streamed response from the model provider.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Attempts to pull out the next event from the response.
    ///
    /// - `Poll::Pending`: no event is ready yet; the task is woken when
    ///   one may be.
    /// - `Poll::Ready(Ok(Some(event)))`: an event, more may follow.
    /// - `Poll::Ready(Ok(None))`: the response is complete. Polling again
    ///   keeps returning `None`.
    /// - `Poll::Ready(Err(error))`: the stream failed.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;

    /// Builds the history message for this response.
    ///
    /// Only meaningful once every event has been polled. Implementations
    /// return the same message on every call.
    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        None
    }
}

/// The reason why a model response has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The model needs to call a tool.
    ToolCalls,
    /// The model has finished generating text.
    Stop,
}

/// A tool call requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier the model uses to match the result to this call.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments, normally a JSON object.
    pub arguments: Value,
}

/// The event from a model response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// The response has been completed.
    Completed(ModelFinishReason),
    /// Received a message delta.
    MessageDelta(String),
    /// Received a tool call request.
    ToolCall(ToolCallRequest),
}
