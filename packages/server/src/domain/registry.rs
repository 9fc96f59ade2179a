//! Connection Registry
//!
//! ## 責務
//!
//! - プロセス内の Room → 接続中コネクションの対応を管理
//! - ローカル接続へのイベント配信（local fanout）
//! - 「ユーザーの最後の接続が切れたか」の判定材料を提供
//!
//! ## 設計ノート
//!
//! Rooms live in a `DashMap`, so mutations lock only the shard holding the
//! room and unrelated rooms are not serialized. Per-(room, user) async locks
//! let the presence tracker make "register + store update" and
//! "unregister + last-connection check + store update" atomic with respect to
//! each other on this node.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};

use super::{
    entity::RoomEvent,
    value_object::{ConnectionId, RoomId, UserId},
};

/// Outbound delivery channel of one connection
pub type EventSender = mpsc::UnboundedSender<RoomEvent>;

/// Receiving half of [`EventSender`], drained by the connection's write loop
pub type EventReceiver = mpsc::UnboundedReceiver<RoomEvent>;

/// A live connection as seen by the registry.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub sender: EventSender,
}

/// Per-process mapping from room to its live connections.
///
/// Created once at startup and injected into the use cases.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    rooms: DashMap<RoomId, HashMap<ConnectionId, ConnectionHandle>>,
    presence_locks: DashMap<(RoomId, UserId), Arc<Mutex<()>>>,
    next_connection_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a connection ID that is unique for the lifetime of this process.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn add(&self, room_id: &RoomId, handle: ConnectionHandle) {
        tracing::debug!(
            room_id = %room_id,
            user_id = %handle.user_id,
            connection_id = %handle.id,
            "connection registered"
        );
        self.rooms
            .entry(room_id.clone())
            .or_default()
            .insert(handle.id, handle);
    }

    /// Unregister a connection. Returns `None` if it was not registered, so a
    /// second call (disconnect racing a forced close) is harmless.
    pub fn remove(&self, room_id: &RoomId, connection_id: ConnectionId) -> Option<ConnectionHandle> {
        let removed = self
            .rooms
            .get_mut(room_id)
            .and_then(|mut connections| connections.remove(&connection_id));
        self.rooms
            .remove_if(room_id, |_, connections| connections.is_empty());

        if removed.is_some() {
            tracing::debug!(room_id = %room_id, connection_id = %connection_id, "connection unregistered");
        }
        removed
    }

    pub fn count_connections_for_user(&self, room_id: &RoomId, user_id: UserId) -> usize {
        self.rooms
            .get(room_id)
            .map(|connections| {
                connections
                    .values()
                    .filter(|handle| handle.user_id == user_id)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn connection_count(&self, room_id: &RoomId) -> usize {
        self.rooms
            .get(room_id)
            .map(|connections| connections.len())
            .unwrap_or(0)
    }

    /// Distinct users with a local connection in the room. Used as the
    /// degraded presence count when the shared store is unreachable.
    pub fn distinct_user_count(&self, room_id: &RoomId) -> usize {
        self.rooms
            .get(room_id)
            .map(|connections| {
                connections
                    .values()
                    .map(|handle| handle.user_id)
                    .collect::<HashSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    }

    pub fn has_connections(&self, room_id: &RoomId) -> bool {
        self.connection_count(room_id) > 0
    }

    /// Rooms with at least one local connection.
    pub fn rooms(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Deliver `event` to every registered connection of the room.
    ///
    /// Connections whose channel has already closed are skipped. Returns the
    /// number of connections the event was handed to.
    pub fn local_fanout(&self, room_id: &RoomId, event: &RoomEvent) -> usize {
        let Some(connections) = self.rooms.get(room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for handle in connections.values() {
            if handle.sender.send(event.clone()).is_err() {
                tracing::debug!(
                    room_id = %room_id,
                    connection_id = %handle.id,
                    "outbound channel closed, skipping"
                );
                continue;
            }
            delivered += 1;
        }
        delivered
    }

    /// Snapshot of `(room, distinct users)` for every room with local connections.
    pub fn presence_leases(&self) -> Vec<(RoomId, Vec<UserId>)> {
        self.rooms
            .iter()
            .map(|entry| {
                let mut users: Vec<UserId> = entry
                    .value()
                    .values()
                    .map(|handle| handle.user_id)
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .collect();
                users.sort();
                (entry.key().clone(), users)
            })
            .collect()
    }

    /// Lock serializing presence transitions of one user in one room.
    pub fn presence_lock(&self, room_id: &RoomId, user_id: UserId) -> Arc<Mutex<()>> {
        self.presence_locks
            .entry((room_id.clone(), user_id))
            .or_default()
            .clone()
    }

    /// Drop the lock entry once nobody else holds or waits for it.
    pub fn release_presence_lock(&self, room_id: &RoomId, user_id: UserId) {
        self.presence_locks
            .remove_if(&(room_id.clone(), user_id), |_, lock| {
                Arc::strong_count(lock) == 1
            });
    }
}
