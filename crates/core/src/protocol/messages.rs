//! MCP payloads carried inside JSON-RPC frames.

use serde::Deserialize;
use serde_json::{Value, json};

use super::frame::PROTOCOL_VERSION;

pub fn initialize_params(client_name: &str, client_version: &str) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": { "name": client_name, "version": client_version },
    })
}

#[derive(Clone, Debug, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(rename = "serverInfo")]
    pub server_info: Option<WireServerInfo>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WireServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListToolsPage {
    pub tools: Vec<WireTool>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(rename = "structuredContent", default)]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Text items joined by newlines; other items as raw JSON.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|item| match item.get("type").and_then(Value::as_str) {
                Some("text") => item
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                _ => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_tool_result_text() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "line one" },
                { "type": "image", "data": "AAAA", "mimeType": "image/png" },
                { "type": "text", "text": "line two" },
            ],
            "isError": false,
        }))
        .unwrap();
        assert_eq!(
            result.text(),
            "line one\n{\"data\":\"AAAA\",\"mimeType\":\"image/png\",\"type\":\"image\"}\nline two"
        );
        assert!(result.structured_content.is_none());
    }
}
