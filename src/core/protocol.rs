/// MCP Wire Types
///
/// JSON-RPC 2.0 envelopes used on every transport, plus the `ToolResult`
/// value that crosses the tool-call boundary.

use base64::Engine;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// JSON-RPC error code for an unknown method.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC error code for missing or malformed params.
pub const INVALID_PARAMS: i32 = -32602;
/// JSON-RPC error code for failures on the server side.
pub const INTERNAL_ERROR: i32 = -32603;

/// MCP protocol revision spoken by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is `None` for notifications. The `jsonrpc` marker is tolerated when
/// absent because stateless clients frequently post bare `{method, params}`
/// bodies.
#[derive(Deserialize, Debug, Clone)]
pub struct MCPRequest {
    /// JSON-RPC version identifier, normally "2.0"
    #[serde(default)]
    #[allow(dead_code)]
    pub jsonrpc: String,
    /// Request ID for correlating responses. None indicates a notification.
    #[serde(default)]
    pub id: Option<Value>,
    /// MCP method name (e.g., "initialize", "tools/list", "tools/call")
    pub method: String,
    /// Method-specific parameters as JSON value
    #[serde(default)]
    pub params: Option<Value>,
}

impl MCPRequest {
    /// Build a request with `jsonrpc` set to "2.0".
    #[cfg(test)]
    pub fn new(id: Option<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// True when the message expects no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// One inbound message body: a single request or a JSON-RPC batch.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum MCPMessage {
    Single(MCPRequest),
    Batch(Vec<MCPRequest>),
}

impl MCPMessage {
    /// Flatten into requests in arrival order.
    pub fn into_requests(self) -> Vec<MCPRequest> {
        match self {
            MCPMessage::Single(request) => vec![request],
            MCPMessage::Batch(requests) => requests,
        }
    }
}

/// JSON-RPC 2.0 response structure for MCP protocol.
///
/// Responses include jsonrpc "2.0", the request id, and either a result
/// or an error.
#[derive(Serialize, Debug, Clone)]
pub struct MCPResponse {
    /// JSON-RPC version identifier, always "2.0"
    pub jsonrpc: String,
    /// Request ID from the original request
    pub id: Option<Value>,
    /// Response result, present when request succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error information, present when request failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MCPError>,
}

impl MCPResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Debug, Clone)]
pub struct MCPError {
    /// JSON-RPC error code (e.g., -32601 for method not found)
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// One block of tool output.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Raw image bytes; base64-encoded on the wire.
    Image {
        #[serde(serialize_with = "serialize_base64")]
        data: Vec<u8>,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn image(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        ContentBlock::Image {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Text payload, if this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Image { .. } => None,
        }
    }
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}

/// The structured success/failure envelope returned by every tool call.
///
/// A failed *tool* call is still a successful *protocol* call: transports
/// wrap this value in a normal JSON-RPC result regardless of `is_error`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: Vec<ContentBlock>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Single text block flagged as an error.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: true,
        }
    }

    /// First text block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(ContentBlock::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_method_and_params_body_parses() {
        let message: MCPMessage =
            serde_json::from_value(json!({"method": "tools/list", "params": {}})).unwrap();
        let requests = message.into_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "tools/list");
        assert!(requests[0].is_notification());
    }

    #[test]
    fn batch_preserves_order() {
        let message: MCPMessage = serde_json::from_value(json!([
            {"jsonrpc": "2.0", "id": 1, "method": "ping"},
            {"jsonrpc": "2.0", "id": 2, "method": "tools/list"}
        ]))
        .unwrap();
        let methods: Vec<_> = message
            .into_requests()
            .into_iter()
            .map(|r| r.method)
            .collect();
        assert_eq!(methods, vec!["ping", "tools/list"]);
    }

    #[test]
    fn failure_omits_result() {
        let value =
            serde_json::to_value(MCPResponse::failure(Some(json!(7)), METHOD_NOT_FOUND, "nope"))
                .unwrap();
        assert_eq!(value["error"]["code"], -32601);
        assert!(value.get("result").is_none());
        assert_eq!(value["id"], 7);
    }

    #[test]
    fn tool_result_wire_shape() {
        let result = ToolResult::success(vec![
            ContentBlock::text("hello"),
            ContentBlock::image(vec![1, 2, 3], "image/png"),
        ]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], false);
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][1]["type"], "image");
        assert_eq!(value["content"][1]["data"], "AQID");
        assert_eq!(value["content"][1]["mimeType"], "image/png");
    }
}
