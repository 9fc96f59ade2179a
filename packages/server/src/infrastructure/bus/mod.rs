//! Broadcast Bus implementations
//!
//! - `inmemory`: tokio broadcast channel per topic, shared by cloned handles
//! - `redis`: Redis PUBLISH / SUBSCRIBE carrying JSON `BusEventDto` payloads

pub mod inmemory;
pub mod redis;

pub use inmemory::InMemoryBroadcastBus;
pub use redis::RedisBroadcastBus;
