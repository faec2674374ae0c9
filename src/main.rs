/// Astro Daily MCP Server Entry Point
///
/// Loads configuration from the environment, sets up logging and runs the
/// HTTP server until SIGINT or SIGTERM.
///
/// See `ServerConfig::from_env` for the recognised environment variables.
/// Log verbosity follows `RUST_LOG` (default: "info").

mod core;
mod tools;

use tracing_subscriber::EnvFilter;

use crate::core::config::ServerConfig;
use crate::core::server;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr so stdout stays free for piping
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing();

    let config = ServerConfig::from_env();
    server::run_server_http(config).await
}
