//! Broadcast Bus payloads.
//!
//! Events are tagged by `type` so the receiving process dispatches with a
//! plain `match` on the decoded variant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEventDto {
    ChatMessage {
        room_id: String,
        user_id: i64,
        username: String,
        message: String,
        timestamp: i64,
    },
    OnlineUsersCount {
        room_id: String,
        count: u64,
        observed_at: i64,
    },
}

impl BusEventDto {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
