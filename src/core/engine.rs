/// MCP Protocol Engine
///
/// Maps JSON-RPC requests onto the tool registry. Shared by the stateless
/// HTTP path and by every session worker.

use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, MCPRequest, MCPResponse, METHOD_NOT_FOUND, PROTOCOL_VERSION,
};
use crate::core::registry::ToolRegistry;

/// Server metadata reported by `initialize`.
#[derive(Clone, Debug)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

pub struct McpEngine {
    info: ServerInfo,
    registry: Arc<ToolRegistry>,
}

impl McpEngine {
    pub fn new(info: ServerInfo, registry: Arc<ToolRegistry>) -> Self {
        Self { info, registry }
    }

    /// Handle one request.
    ///
    /// Returns `None` for notifications, which never get a response even when
    /// the method is unknown.
    pub async fn handle(&self, request: MCPRequest) -> Option<MCPResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "notification received");
            return None;
        }
        Some(self.dispatch(request).await)
    }

    /// Answer a request unconditionally, even one without an id.
    ///
    /// The stateless HTTP path uses this directly since a bare
    /// `{method, params}` body still expects a response.
    pub async fn dispatch(&self, request: MCPRequest) -> MCPResponse {
        let id = request.id;
        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => MCPResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            other => MCPResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> MCPResponse {
        MCPResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": self.info.name,
                    "version": self.info.version
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Option<Value>) -> MCPResponse {
        MCPResponse::success(id, json!({ "tools": self.registry.list_tools() }))
    }

    /// Tool failures come back inside a successful result; only a missing
    /// or malformed `params` object is a protocol error.
    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> MCPResponse {
        let Some(Value::Object(mut params)) = params else {
            return MCPResponse::failure(id, INVALID_PARAMS, "Invalid params");
        };
        let Some(Value::String(name)) = params.remove("name") else {
            return MCPResponse::failure(id, INVALID_PARAMS, "Invalid params: missing tool name");
        };
        let arguments = params.remove("arguments").unwrap_or(Value::Null);

        let result = self.registry.call_tool(&name, arguments).await;
        if result.is_error {
            debug!(tool = %name, reason = result.first_text().unwrap_or(""), "tool call failed");
        }
        result_response(id, &result)
    }
}

/// Wrap a serializable result in a success envelope.
///
/// A result that cannot be encoded is the server's fault, so it maps to
/// `INTERNAL_ERROR` rather than blaming the caller's params.
fn result_response<T: Serialize>(id: Option<Value>, result: &T) -> MCPResponse {
    match serde_json::to_value(result) {
        Ok(value) => MCPResponse::success(id, value),
        Err(e) => {
            warn!(error = %e, "failed to encode tool result");
            MCPResponse::failure(id, INTERNAL_ERROR, format!("Unserializable result: {e}"))
        }
    }
}
