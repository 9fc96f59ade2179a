//! HTTP and WebSocket handlers.

pub mod http;
pub mod websocket;
