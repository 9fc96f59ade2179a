//! UseCase: プレゼンス管理
//!
//! ## 責務
//!
//! - 接続登録と Presence Store への add を 1 つの遷移として扱う
//! - 最後のローカル接続が切れたときだけ Presence Store から remove する
//! - オンライン人数を計算して Room にブロードキャストする
//!
//! Store calls are bounded by the configured timeout. A failing or slow store
//! never blocks a join or leave: the error is logged and the count degrades to
//! this process's view.

use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use lounge_shared::time::Clock;

use crate::domain::{
    ConnectionHandle, ConnectionId, ConnectionRegistry, PresenceCountEvent, PresenceError,
    PresenceStore, RoomEvent, RoomId, Timestamp, UserId,
};

use super::broadcast::RoomBroadcaster;

/// Presence view of one room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub online_users_count: u64,
    pub local_connections: usize,
    /// The count comes from the local registry because the store failed.
    pub degraded: bool,
}

pub struct PresenceTracker {
    store: Arc<dyn PresenceStore>,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<RoomBroadcaster>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    /// Last count broadcast per room
    last_counts: DashMap<RoomId, u64>,
}

impl PresenceTracker {
    pub fn new(
        store: Arc<dyn PresenceStore>,
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<RoomBroadcaster>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            broadcaster,
            clock,
            timeout,
            last_counts: DashMap::new(),
        }
    }

    /// Register the connection and claim presence for its user.
    pub async fn join(&self, room_id: &RoomId, handle: ConnectionHandle) {
        let user_id = handle.user_id;
        let lock = self.registry.presence_lock(room_id, user_id);
        {
            let _guard = lock.lock().await;
            self.registry.add(room_id, handle);
            if let Err(e) = self.bounded(self.store.add(room_id, user_id)).await {
                tracing::warn!(room_id = %room_id, user_id = %user_id, "presence add failed: {}", e);
            }
        }
        drop(lock);
        self.registry.release_presence_lock(room_id, user_id);
    }

    /// Unregister the connection. Presence is withdrawn only when it was the
    /// user's last connection in the room on this process.
    ///
    /// Returns `false` if the connection was not registered.
    pub async fn leave(&self, room_id: &RoomId, connection_id: ConnectionId, user_id: UserId) -> bool {
        let lock = self.registry.presence_lock(room_id, user_id);
        let removed = {
            let _guard = lock.lock().await;
            let removed = self.registry.remove(room_id, connection_id).is_some();
            if removed && self.registry.count_connections_for_user(room_id, user_id) == 0 {
                match self.bounded(self.store.remove(room_id, user_id)).await {
                    Ok(()) => {
                        tracing::debug!(room_id = %room_id, user_id = %user_id, "presence withdrawn")
                    }
                    Err(e) => {
                        tracing::warn!(room_id = %room_id, user_id = %user_id, "presence remove failed: {}", e)
                    }
                }
            }
            removed
        };
        drop(lock);
        self.registry.release_presence_lock(room_id, user_id);
        removed
    }

    /// Read the current count and broadcast it to the room.
    pub async fn broadcast_count(&self, room_id: &RoomId) -> u64 {
        // Stamp before reading, so a slower read never supersedes a newer one
        let observed_at = Timestamp::new(self.clock.now_millis());
        let snapshot = self.snapshot(room_id).await;

        tracing::info!(
            room_id = %room_id,
            count = snapshot.online_users_count,
            degraded = snapshot.degraded,
            "broadcasting online users count"
        );
        let event = RoomEvent::OnlineUsersCount(PresenceCountEvent {
            room_id: room_id.clone(),
            count: snapshot.online_users_count,
            observed_at,
        });
        self.last_counts
            .insert(room_id.clone(), snapshot.online_users_count);
        self.broadcaster.broadcast(event).await;
        snapshot.online_users_count
    }

    /// Re-read the count of every room with local connections and broadcast
    /// it where it moved since the last broadcast, e.g. because another
    /// node's leases expired.
    ///
    /// Returns the number of rooms a count was broadcast to.
    pub async fn broadcast_changed_counts(&self) -> usize {
        let rooms = self.registry.rooms();
        self.last_counts.retain(|room_id, _| rooms.contains(room_id));

        let mut broadcast = 0;
        for room_id in rooms {
            let snapshot = self.snapshot(&room_id).await;
            if snapshot.degraded {
                continue;
            }
            let last = self.last_counts.get(&room_id).map(|count| *count);
            if last != Some(snapshot.online_users_count) {
                tracing::debug!(room_id = %room_id, ?last, count = snapshot.online_users_count, "online users count drifted");
                self.broadcast_count(&room_id).await;
                broadcast += 1;
            }
        }
        broadcast
    }

    pub async fn snapshot(&self, room_id: &RoomId) -> PresenceSnapshot {
        let local_connections = self.registry.connection_count(room_id);
        match self.bounded(self.store.cardinality(room_id)).await {
            Ok(count) => PresenceSnapshot {
                online_users_count: count,
                local_connections,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(room_id = %room_id, "presence cardinality failed, using local count: {}", e);
                PresenceSnapshot {
                    online_users_count: self.registry.distinct_user_count(room_id) as u64,
                    local_connections,
                    degraded: true,
                }
            }
        }
    }

    /// Renew the lease of every user with a local connection.
    ///
    /// Each room's users are refreshed while holding their presence locks
    /// (taken in user order), and only users still connected at that point
    /// are renewed. A lease withdrawn by a concurrent `leave` stays withdrawn.
    pub async fn refresh_leases(&self) {
        for (room_id, user_ids) in self.registry.presence_leases() {
            let locks: Vec<_> = user_ids
                .iter()
                .map(|user_id| (*user_id, self.registry.presence_lock(&room_id, *user_id)))
                .collect();
            let mut guards = Vec::with_capacity(locks.len());
            for (_, lock) in &locks {
                guards.push(Arc::clone(lock).lock_owned().await);
            }

            let connected: Vec<UserId> = user_ids
                .into_iter()
                .filter(|user_id| self.registry.count_connections_for_user(&room_id, *user_id) > 0)
                .collect();
            if !connected.is_empty() {
                let users = connected.len();
                if let Err(e) = self.bounded(self.store.refresh(&room_id, connected)).await {
                    tracing::warn!(room_id = %room_id, users, "presence refresh failed: {}", e);
                }
            }

            drop(guards);
            for (user_id, lock) in locks {
                drop(lock);
                self.registry.release_presence_lock(&room_id, user_id);
            }
        }
    }

    /// Withdraw every lease this process still holds.
    pub async fn release_all(&self) {
        for (room_id, user_ids) in self.registry.presence_leases() {
            for user_id in user_ids {
                if let Err(e) = self.bounded(self.store.remove(&room_id, user_id)).await {
                    tracing::warn!(room_id = %room_id, user_id = %user_id, "presence release failed: {}", e);
                }
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, PresenceError>>,
    ) -> Result<T, PresenceError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PresenceError::Timeout),
        }
    }
}
