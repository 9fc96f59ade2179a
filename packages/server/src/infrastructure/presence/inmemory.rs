//! InMemory Presence Store 実装
//!
//! Lease table shared by every handle cloned from the same store. Handles
//! created with [`InMemoryPresenceStore::for_node`] act as separate backend
//! processes over one shared table, which is how multi-node behavior is
//! exercised without an external server.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use lounge_shared::time::Clock;

use crate::domain::{NodeId, PresenceError, PresenceStore, RoomId, UserId};

type LeaseTable = DashMap<RoomId, HashMap<(UserId, NodeId), i64>>;

#[derive(Clone)]
pub struct InMemoryPresenceStore {
    leases: Arc<LeaseTable>,
    node_id: NodeId,
    ttl_millis: i64,
    clock: Arc<dyn Clock>,
}

impl InMemoryPresenceStore {
    pub fn new(node_id: NodeId, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            leases: Arc::new(DashMap::new()),
            node_id,
            ttl_millis: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
        }
    }

    /// Handle over the same lease table on behalf of another node.
    pub fn for_node(&self, node_id: NodeId) -> Self {
        Self {
            leases: Arc::clone(&self.leases),
            node_id,
            ttl_millis: self.ttl_millis,
            clock: Arc::clone(&self.clock),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn expires_at(&self) -> i64 {
        self.clock.now_millis().saturating_add(self.ttl_millis)
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn add(&self, room_id: &RoomId, user_id: UserId) -> Result<(), PresenceError> {
        let expires_at = self.expires_at();
        self.leases
            .entry(room_id.clone())
            .or_default()
            .insert((user_id, self.node_id), expires_at);
        Ok(())
    }

    async fn remove(&self, room_id: &RoomId, user_id: UserId) -> Result<(), PresenceError> {
        if let Some(mut leases) = self.leases.get_mut(room_id) {
            leases.remove(&(user_id, self.node_id));
        }
        self.leases.remove_if(room_id, |_, leases| leases.is_empty());
        Ok(())
    }

    async fn cardinality(&self, room_id: &RoomId) -> Result<u64, PresenceError> {
        let now = self.clock.now_millis();
        let count = match self.leases.get_mut(room_id) {
            Some(mut leases) => {
                leases.retain(|_, expires_at| *expires_at > now);
                let mut users: Vec<UserId> = leases.keys().map(|(user_id, _)| *user_id).collect();
                users.sort();
                users.dedup();
                users.len() as u64
            }
            None => 0,
        };
        self.leases.remove_if(room_id, |_, leases| leases.is_empty());
        Ok(count)
    }

    async fn refresh(&self, room_id: &RoomId, user_ids: Vec<UserId>) -> Result<(), PresenceError> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let expires_at = self.expires_at();
        let mut leases = self.leases.entry(room_id.clone()).or_default();
        for user_id in user_ids {
            leases.insert((user_id, self.node_id), expires_at);
        }
        Ok(())
    }
}
