//! Process-scoped collaborators shared by every [`RoomSession`](super::RoomSession).

use std::{sync::Arc, time::Duration};

use lounge_shared::time::Clock;

use crate::domain::{Authenticator, BroadcastBus, ConnectionRegistry, MessageGateway, PresenceStore};

use super::{broadcast::RoomBroadcaster, presence::PresenceTracker, relay::RoomRelay};

/// Created once at startup and torn down with [`SessionContext::shutdown`].
pub struct SessionContext {
    pub authenticator: Arc<dyn Authenticator>,
    pub gateway: Arc<dyn MessageGateway>,
    pub registry: Arc<ConnectionRegistry>,
    pub relay: Arc<RoomRelay>,
    pub broadcaster: Arc<RoomBroadcaster>,
    pub presence: Arc<PresenceTracker>,
    pub clock: Arc<dyn Clock>,
}

impl SessionContext {
    /// Wire the use cases around a fresh connection registry.
    ///
    /// `store_timeout` bounds every Presence Store and Broadcast Bus call made
    /// on behalf of a session.
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        gateway: Arc<dyn MessageGateway>,
        presence_store: Arc<dyn PresenceStore>,
        bus: Arc<dyn BroadcastBus>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = Arc::new(RoomRelay::new(
            Arc::clone(&bus),
            Arc::clone(&registry),
            store_timeout,
        ));
        let broadcaster = Arc::new(RoomBroadcaster::new(
            bus,
            Arc::clone(&registry),
            Arc::clone(&relay),
            store_timeout,
        ));
        let presence = Arc::new(PresenceTracker::new(
            presence_store,
            Arc::clone(&registry),
            Arc::clone(&broadcaster),
            Arc::clone(&clock),
            store_timeout,
        ));

        Self {
            authenticator,
            gateway,
            registry,
            relay,
            broadcaster,
            presence,
            clock,
        }
    }

    /// Withdraw this process's presence and stop relaying bus events.
    pub async fn shutdown(&self) {
        self.presence.release_all().await;
        self.relay.shutdown().await;
        tracing::info!("session context shut down");
    }
}
