//! Lounge terminal chat client.
//!
//! Joins one room, prints chat and presence frames, and sends each typed line
//! as a chat message. Reconnects on disconnection (max 5 attempts with 5
//! second interval) unless the server rejected the token.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lounge-client -- --room general --token <jwt> --user-id 1
//! ```

use clap::Parser;

use lounge_client::{ClientConfig, run_client};
use lounge_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "lounge-client")]
#[command(about = "Terminal chat client for Lounge rooms", long_about = None)]
struct Args {
    /// Server base URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080")]
    url: String,

    /// Room to join
    #[arg(short = 'r', long)]
    room: String,

    /// Access token
    #[arg(short = 't', long, env = "LOUNGE_TOKEN", hide_env_values = true)]
    token: String,

    /// User id sent with every message
    #[arg(long)]
    user_id: i64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = ClientConfig {
        url: args.url,
        room: args.room,
        token: args.token,
        user_id: args.user_id,
    };

    if let Err(e) = run_client(config).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
