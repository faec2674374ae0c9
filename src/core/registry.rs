/// Tool Registry
///
/// Declares the available tools and routes validated calls to their
/// implementations. Argument validation happens here, before a tool ever
/// sees its input, so implementations only deal with typed arguments.

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::protocol::ToolResult;

/// MCP tool definition structure.
///
/// Serialized as-is in `tools/list` responses.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MCPTool {
    /// Unique tool identifier
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema defining the tool's input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A callable tool with a typed argument shape.
///
/// `Args` is the validated form of the raw JSON arguments. Implementations
/// must report their own failures through `ToolResult::error` rather than
/// panicking.
pub trait Tool: Send + Sync + 'static {
    type Args: DeserializeOwned + Send + 'static;

    /// Descriptor advertised through `tools/list`.
    fn descriptor(&self) -> MCPTool;

    /// Execute the tool with already-validated arguments.
    fn call(&self, args: Self::Args) -> impl Future<Output = ToolResult> + Send;
}

/// Type-erased tool handler: raw JSON arguments in, `ToolResult` out.
pub type ToolHandler = Box<dyn Fn(Value) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// Registry of available MCP tools.
///
/// Keeps descriptors in registration order for deterministic discovery and a
/// map of names to handlers for execution.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<MCPTool>,
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with the registry.
    ///
    /// The generated handler deserializes raw arguments into `T::Args`; a
    /// failed conversion becomes an error result and the tool is not invoked.
    /// Registering a second tool under an existing name replaces it.
    pub fn register<T: Tool>(&mut self, tool: Arc<T>) {
        let descriptor = tool.descriptor();
        let name = descriptor.name.clone();

        let tool_name = name.clone();
        let handler: ToolHandler = Box::new(move |raw: Value| {
            let tool = Arc::clone(&tool);
            let tool_name = tool_name.clone();
            Box::pin(async move {
                match serde_json::from_value::<T::Args>(raw) {
                    Ok(args) => tool.call(args).await,
                    Err(e) => {
                        debug!(tool = %tool_name, error = %e, "rejected tool arguments");
                        ToolResult::error(format!("Invalid arguments for {tool_name}: {e}"))
                    }
                }
            })
        });

        self.tools.retain(|t| t.name != name);
        self.tools.push(descriptor);
        self.handlers.insert(name, handler);
    }

    /// All tool descriptors, in registration order.
    ///
    /// # Returns
    /// Borrowed descriptors, ready to serialize into a `tools/list` result
    pub fn list_tools(&self) -> &[MCPTool] {
        &self.tools
    }

    /// Validate and dispatch one tool call.
    ///
    /// Never fails past this boundary: unknown names and invalid arguments
    /// both come back as `ToolResult { is_error: true }`.
    ///
    /// # Arguments
    /// * `name` - Tool name from `tools/call` params
    /// * `arguments` - Raw JSON arguments; null is treated as `{}`
    ///
    /// # Returns
    /// The tool's result, or an error result describing why it never ran
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult {
        let Some(handler) = self.handlers.get(name) else {
            warn!(tool = %name, "call to unknown tool");
            return ToolResult::error(format!("Unknown tool: {name}"));
        };
        // Missing arguments are treated like an empty object.
        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };
        handler(arguments).await
    }
}
