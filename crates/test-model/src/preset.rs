use mcp_agent_model::ToolCallRequest;
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// One scripted assistant response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// Number of times `send_request` fails before this response is
    /// served. `Some(0)` fails forever.
    #[serde(default)]
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// A plain text answer.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    pub(crate) fn has_tool_call(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCall(_)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me check.".to_string()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call_1".to_string(),
                name: "count_commits".to_string(),
                arguments: json!({ "repo": "odpi/egeria" }),
            }),
        ])
        .with_failures(1);

        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized["events"][1]["type"], "tool_call");
        assert_eq!(serialized["events"][1]["data"]["name"], "count_commits");

        let deserialized: PresetResponse =
            serde_json::from_value(serialized).unwrap();
        assert_eq!(response, deserialized);
        assert!(deserialized.has_tool_call());
    }
}
