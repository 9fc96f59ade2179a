//! Terminal client for Lounge chat rooms.

mod error;
mod formatter;
mod runner;
mod session;
mod ui;

pub use error::ClientError;
pub use formatter::MessageFormatter;
pub use runner::run_client;
pub use session::{ClientConfig, run_client_session};
