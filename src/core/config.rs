/// Server Configuration
///
/// All settings come from environment variables with defaults, so the
/// binary runs with no configuration at all for local development.

use std::path::PathBuf;
use std::time::Duration;

/// Default chat-completions endpoint base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default chat model used for horoscope text.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
/// Default idle interval between SSE keep-alive comments, in seconds.
pub const DEFAULT_SSE_KEEP_ALIVE_SECS: u64 = 15;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server name as reported in MCP initialize responses
    pub server_name: String,
    /// Server version string as reported in MCP initialize responses
    pub server_version: String,
    pub host: String,
    pub port: u16,
    /// Actix worker threads
    pub workers: usize,
    /// Directory generated cards are written to and served from
    pub output_dir: PathBuf,
    /// Idle interval between `: ping` frames on open SSE streams
    pub keep_alive: Duration,
    pub openai: OpenAiConfig,
    /// Fixed seed for lucky-value draws; entropy when unset
    pub seed: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment Variables:
    /// - SERVER_NAME: Name of the server (default: "astro-daily")
    /// - SERVER_VERSION: Version string (default: "1.0.0")
    /// - HOST: Bind address (default: "0.0.0.0")
    /// - PORT: Port number (default: 3000)
    /// - WORKER_THREADS: Worker count (default: CPU count, capped at 16)
    /// - OUTPUT_DIR: Card output directory (default: "output")
    /// - OPENAI_API_KEY, OPENAI_BASE_URL, OPENAI_MODEL: text generation API
    /// - HOROSCOPE_SEED: Seed for lucky number, color and vibe draws
    /// - SSE_KEEP_ALIVE_SECS: SSE keep-alive interval (default: 15, minimum 1)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reading through `lookup`, which keeps tests
    /// away from the real process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = var("PORT", "3000").parse::<u16>().unwrap_or(3000);
        // Defaults to CPU count but capped at 16 to avoid excessive context switching
        let workers = lookup("WORKER_THREADS")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or_else(|| num_cpus::get().clamp(1, 16));
        let keep_alive = lookup("SSE_KEEP_ALIVE_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_SSE_KEEP_ALIVE_SECS);

        Self {
            server_name: var("SERVER_NAME", "astro-daily"),
            server_version: var("SERVER_VERSION", "1.0.0"),
            host: var("HOST", "0.0.0.0"),
            port,
            workers,
            output_dir: PathBuf::from(var("OUTPUT_DIR", "output")),
            keep_alive: Duration::from_secs(keep_alive),
            openai: OpenAiConfig {
                api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
                base_url: var("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
                model: var("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            },
            seed: lookup("HOROSCOPE_SEED").and_then(|s| s.parse::<u64>().ok()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
