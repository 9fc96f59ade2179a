//! Utilities shared by the Lounge server and client binaries.

pub mod logger;
pub mod time;
