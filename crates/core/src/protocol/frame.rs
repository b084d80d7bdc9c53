use serde::Serialize;
use serde_json::{Map, Value};

/// MCP revision sent in the `initialize` request.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC "method not found".
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Serialize)]
struct OutgoingRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
}

#[derive(Serialize)]
struct OutgoingNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
}

#[derive(Serialize)]
struct OutgoingError<'a> {
    jsonrpc: &'static str,
    id: &'a Value,
    error: ErrorObject<'a>,
}

#[derive(Serialize)]
struct ErrorObject<'a> {
    code: i64,
    message: &'a str,
}

/// Encodes a request as one line, including the trailing newline.
pub fn encode_request(id: u64, method: &str, params: Option<&Value>) -> String {
    finish_line(&OutgoingRequest {
        jsonrpc: JSONRPC_VERSION,
        id,
        method,
        params,
    })
}

pub fn encode_notification(method: &str, params: Option<&Value>) -> String {
    finish_line(&OutgoingNotification {
        jsonrpc: JSONRPC_VERSION,
        method,
        params,
    })
}

pub fn encode_error(id: &Value, code: i64, message: &str) -> String {
    finish_line(&OutgoingError {
        jsonrpc: JSONRPC_VERSION,
        id,
        error: ErrorObject { code, message },
    })
}

fn finish_line<T: Serialize>(frame: &T) -> String {
    // Serializing these structs can't fail: every key is a string and every
    // value is already valid JSON.
    let mut line = serde_json::to_string(frame).unwrap_or_default();
    line.push('\n');
    line
}

/// The body of a response frame.
#[derive(Debug, PartialEq)]
pub enum ResponseBody {
    Result(Value),
    Error { code: i64, message: String },
    Malformed(String),
}

/// A decoded inbound frame.
#[derive(Debug, PartialEq)]
pub enum Incoming {
    Response { id: u64, body: ResponseBody },
    Request { id: Value, method: String },
    Notification { method: String },
}

/// Why a line could not be decoded into a frame at all.
#[derive(Debug, PartialEq)]
pub enum DecodeError {
    NotJson,
    NotAnObject,
    /// A response whose id we could never have issued.
    ForeignId(Value),
    Unrecognized,
}

pub fn decode(line: &str) -> Result<Incoming, DecodeError> {
    let value: Value =
        serde_json::from_str(line).map_err(|_| DecodeError::NotJson)?;
    let Value::Object(mut obj) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let method = match obj.remove("method") {
        Some(Value::String(method)) => Some(method),
        _ => None,
    };
    let id = obj.remove("id").filter(|id| !id.is_null());

    match (method, id) {
        (Some(method), Some(id)) => Ok(Incoming::Request { id, method }),
        (Some(method), None) => Ok(Incoming::Notification { method }),
        (None, Some(id)) => {
            let Some(id) = id.as_u64() else {
                return Err(DecodeError::ForeignId(id));
            };
            Ok(Incoming::Response {
                id,
                body: response_body(obj),
            })
        }
        (None, None) => Err(DecodeError::Unrecognized),
    }
}

fn response_body(mut obj: Map<String, Value>) -> ResponseBody {
    if let Some(error) = obj.remove("error") {
        let code = error.get("code").and_then(Value::as_i64);
        let message = error.get("message").and_then(Value::as_str);
        return match (code, message) {
            (Some(code), Some(message)) => ResponseBody::Error {
                code,
                message: message.to_owned(),
            },
            _ => ResponseBody::Malformed(format!("invalid error object: {error}")),
        };
    }
    match obj.remove("result") {
        Some(result) => ResponseBody::Result(result),
        None => ResponseBody::Malformed(
            "response has neither `result` nor `error`".to_owned(),
        ),
    }
}
