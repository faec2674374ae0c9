/// Core Server Framework Module
///
/// - protocol.rs: JSON-RPC envelopes and tool results
/// - registry.rs: tool registry and argument validation
/// - engine.rs: MCP method dispatch
/// - session.rs: live session table
/// - transport.rs: legacy HTTP+SSE transport adapter
/// - server.rs: HTTP router and server startup
/// - config.rs, error.rs: configuration and HTTP errors

pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod transport;
