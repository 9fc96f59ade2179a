//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// Presence view of one room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPresenceDto {
    pub room_id: String,
    /// Distinct users online across all processes
    pub online_users_count: u64,
    /// Connections held by this process
    pub local_connections: usize,
    /// `true` when the count came from the local registry because the shared
    /// store could not be reached
    pub degraded: bool,
}
