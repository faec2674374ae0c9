/// Tools Module
///
/// MCP tool implementations. Each tool implements `core::registry::Tool`
/// and is registered in `core::server::initialize_tools`.

pub mod horoscope;
