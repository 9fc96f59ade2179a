//! Lounge chat server.
//!
//! Run with:
//! ```not_rust
//! LOUNGE_JWT_SECRET=change-me cargo run --bin lounge-server -- --directory directory.toml
//! LOUNGE_JWT_SECRET=change-me cargo run --bin lounge-server -- --port 3000 --redis-url redis://127.0.0.1:6379
//! ```

use std::sync::Arc;

use clap::Parser;
use lounge_server::{bootstrap::build_context, config::ServerConfig, ui::Server};
use lounge_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    let context = match build_context(&config).await {
        Ok(context) => Arc::new(context),
        Err(e) => {
            tracing::error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let server = Server::new(context, config.heartbeat_interval());
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
