//! Data Transfer Objects (DTOs) for the chat application.
//!
//! DTOs are organized by protocol:
//! - `websocket`: frames exchanged with clients
//! - `bus`: events exchanged between backend processes
//! - `http`: HTTP API response DTOs

pub mod bus;
pub mod conversion;
pub mod http;
pub mod websocket;
