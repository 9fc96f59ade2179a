//! Presence Store port.

use async_trait::async_trait;

use super::{
    error::PresenceError,
    value_object::{RoomId, UserId},
};

/// Shared, cross-process record of which users are online in which room.
///
/// A store handle belongs to one backend process (node). Entries are leases
/// keyed by `(user, node)`, so `remove` only withdraws this node's claim and
/// never another process's claim for the same user. `cardinality` counts
/// distinct users over all unexpired leases.
///
/// Callers must only `remove` after confirming that no local connection of
/// the user remains in the room.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Claim presence of `user_id` in `room_id` for this node. Idempotent.
    async fn add(&self, room_id: &RoomId, user_id: UserId) -> Result<(), PresenceError>;

    /// Withdraw this node's claim. No-op if it does not exist.
    async fn remove(&self, room_id: &RoomId, user_id: UserId) -> Result<(), PresenceError>;

    /// Number of distinct users with at least one live lease in the room.
    async fn cardinality(&self, room_id: &RoomId) -> Result<u64, PresenceError>;

    /// Extend this node's leases for `user_ids`, recreating any that expired.
    async fn refresh(&self, room_id: &RoomId, user_ids: Vec<UserId>)
    -> Result<(), PresenceError>;
}
