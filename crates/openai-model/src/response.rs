use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use mcp_agent_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest,
};
use pin_project_lite::pin_project;
use serde_json::Value;

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, Delta, Message, ToolCall};

/// Accumulated state of a streaming completion.
struct PartialState {
    sse: Sse,
    id: Option<String>,
    content: String,
    reasoning_content: Option<String>,
    tool_calls: Vec<ToolCall>,
    // Events decoded from the stream but not yet handed out. A single chunk
    // may carry content, tool call starts and the finish reason at once.
    pending_events: VecDeque<PendingEvent>,
    finished: bool,
}

enum PendingEvent {
    Delta(String),
    // Tool calls are only emitted once the stream has finished, since their
    // arguments arrive in fragments.
    Finish(ModelFinishReason),
}

impl PartialState {
    fn new(sse: Sse) -> Self {
        Self {
            sse,
            id: None,
            content: String::new(),
            reasoning_content: None,
            tool_calls: vec![],
            pending_events: VecDeque::new(),
            finished: false,
        }
    }

    fn finish(mut self) -> Option<(String, Message)> {
        for tool_call in &mut self.tool_calls {
            tool_call.index = None;
        }
        Some((
            self.id?,
            Message::Assistant {
                content: (!self.content.is_empty()).then_some(self.content),
                tool_calls: (!self.tool_calls.is_empty())
                    .then_some(self.tool_calls),
                reasoning_content: self.reasoning_content,
            },
        ))
    }

    fn apply_delta(&mut self, delta: Delta) {
        if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
            self.content.push_str(&content);
            self.pending_events.push_back(PendingEvent::Delta(content));
        }
        if let Some(reasoning) = delta.reasoning_content {
            self.reasoning_content
                .get_or_insert_default()
                .push_str(&reasoning);
        }
        for fragment in delta.tool_calls.into_iter().flatten() {
            self.merge_tool_call(fragment);
        }
    }

    fn merge_tool_call(&mut self, fragment: ToolCall) {
        let Some(partial) = self
            .tool_calls
            .iter_mut()
            .find(|t| t.index == fragment.index)
        else {
            self.tool_calls.push(fragment);
            return;
        };
        if let Some(id) = fragment.id {
            partial.id.get_or_insert_default().push_str(&id);
        }
        if let Some(ty) = fragment.r#type {
            partial.r#type.get_or_insert(ty);
        }
        let Some(function) = fragment.function else {
            return;
        };
        match &mut partial.function {
            Some(partial_func) => {
                if let Some(name) = function.name {
                    partial_func.name.get_or_insert_default().push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    partial_func
                        .arguments
                        .get_or_insert_default()
                        .push_str(&arguments);
                }
            }
            None => partial.function = Some(function),
        }
    }

    fn tool_call_requests(&self) -> Vec<ToolCallRequest> {
        self.tool_calls
            .iter()
            .map(|tool_call| {
                let function = tool_call.function.as_ref();
                let arguments = function
                    .and_then(|f| f.arguments.as_deref())
                    .filter(|args| !args.trim().is_empty())
                    .map(|args| {
                        serde_json::from_str::<Value>(args).unwrap_or_else(
                            |_| Value::String(args.to_owned()),
                        )
                    })
                    .unwrap_or_else(|| Value::Object(Default::default()));
                ToolCallRequest {
                    id: tool_call.id.clone().unwrap_or_default(),
                    name: function
                        .and_then(|f| f.name.clone())
                        .unwrap_or_default(),
                    arguments,
                }
            })
            .collect()
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvents = Result<(Vec<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_fut: Option<PinnedFuture<NextEvents>>,
        ready_events: VecDeque<ModelResponseEvent>,
        full_msg: Option<(String, Message)>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let state = PartialState::new(sse);
        Self {
            next_fut: Some(Box::pin(next_events(state))),
            ready_events: VecDeque::new(),
            full_msg: None,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        loop {
            if let Some(event) = this.ready_events.pop_front() {
                return Poll::Ready(Ok(Some(event)));
            }
            let Some(next_fut) = this.next_fut else {
                return Poll::Ready(Ok(None));
            };
            match ready!(next_fut.as_mut().poll(cx)) {
                Ok((events, state)) if state.finished => {
                    this.ready_events.extend(events);
                    *this.next_fut = None;
                    *this.full_msg = state.finish();
                }
                Ok((events, state)) => {
                    this.ready_events.extend(events);
                    *this.next_fut = Some(Box::pin(next_events(state)));
                }
                Err(err) => {
                    *this.next_fut = None;
                    return Poll::Ready(Err(err));
                }
            }
        }
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id, msg.clone()))
    }
}

/// Reads the stream until at least one event is available or the stream
/// ends.
async fn next_events(mut state: PartialState) -> NextEvents {
    let mut finish_reason = None;
    while state.pending_events.is_empty() {
        let sse_event = match state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            break;
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        }

        // The usage chunk carries no choices.
        for choice in chunk.choices {
            state.apply_delta(choice.delta);
            if let Some(reason) = choice.finish_reason {
                finish_reason = Some(if reason == "tool_calls" {
                    ModelFinishReason::ToolCalls
                } else {
                    ModelFinishReason::Stop
                });
            }
        }
        if let Some(reason) = finish_reason {
            state.pending_events.push_back(PendingEvent::Finish(reason));
        }
    }

    let mut events = Vec::new();
    while let Some(pending) = state.pending_events.pop_front() {
        match pending {
            PendingEvent::Delta(delta) => {
                events.push(ModelResponseEvent::MessageDelta(delta));
            }
            PendingEvent::Finish(reason) => {
                events.extend(
                    state
                        .tool_call_requests()
                        .into_iter()
                        .map(ModelResponseEvent::ToolCall),
                );
                events.push(ModelResponseEvent::Completed(reason));
                state.finished = true;
            }
        }
    }
    if events.is_empty() {
        // The stream ended without a finish reason.
        events.extend(
            state
                .tool_call_requests()
                .into_iter()
                .map(ModelResponseEvent::ToolCall),
        );
        state.finished = true;
    }
    Ok((events, state))
}
