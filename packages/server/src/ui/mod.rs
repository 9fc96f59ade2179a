//! WebSocket chat server: axum router, handlers and graceful shutdown.

mod handler;
mod server;
mod signal;
pub mod state;

pub use handler::websocket::{CLOSE_AUTH_FAILED, CLOSE_GOING_AWAY, CLOSE_INVALID_PAYLOAD};
pub use server::Server;
pub use signal::shutdown_signal;
