//! Message Gateway implementations
//!
//! - `inmemory`: process-local store seeded from a directory file
//! - `directory`: TOML directory of users and rooms

pub mod directory;
pub mod inmemory;

pub use directory::{Directory, DirectoryError};
pub use inmemory::InMemoryMessageGateway;
