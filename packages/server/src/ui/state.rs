//! Server state shared by the handlers.

use std::sync::Arc;

use tokio::sync::watch;

use crate::usecase::SessionContext;

/// Shared application state
pub struct AppState {
    /// Registry, presence and broadcast services for every session
    pub context: Arc<SessionContext>,
    /// Flips to `true` when the server starts shutting down
    pub shutdown: watch::Receiver<bool>,
}
