//! Presence Store implementations
//!
//! Both backends keep one lease per `(user, node)` with an absolute expiry,
//! so a crashed process stops counting once its leases lapse.

pub mod inmemory;
pub mod redis;

pub use inmemory::InMemoryPresenceStore;
pub use redis::RedisPresenceStore;
