//! Server configuration from command-line flags and `LOUNGE_*` environment
//! variables.

use std::{path::PathBuf, time::Duration};

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "lounge-server")]
#[command(about = "Chat room server with cross-process presence tracking", long_about = None)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "LOUNGE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "LOUNGE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// HS256 secret used to validate access tokens
    #[arg(long, env = "LOUNGE_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Redis URL for the shared presence store and broadcast bus.
    /// In-process backends are used when unset.
    #[arg(long, env = "LOUNGE_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Namespace for Redis keys and channels
    #[arg(long, env = "LOUNGE_KEY_PREFIX", default_value = "lounge")]
    pub key_prefix: String,

    /// Lifetime of a presence lease that is not renewed
    #[arg(
        long,
        env = "LOUNGE_PRESENCE_TTL_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(3..)
    )]
    pub presence_ttl_secs: u64,

    /// Bound on every presence store / broadcast bus call made by a session
    #[arg(long, env = "LOUNGE_STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,

    /// TOML file with the users and rooms known to the message gateway
    #[arg(long, env = "LOUNGE_DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, env = "LOUNGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn presence_ttl(&self) -> Duration {
        Duration::from_secs(self.presence_ttl_secs)
    }

    /// Leases are renewed three times per TTL, so one missed renewal is harmless.
    pub fn heartbeat_interval(&self) -> Duration {
        self.presence_ttl() / 3
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
