//! UseCase: Room 宛てイベントの配信
//!
//! Publishes to the Broadcast Bus with a bounded wait. When the bus is
//! unreachable, or this process has no live subscription for the room, the
//! event is handed to local connections directly so same-process recipients
//! still get it.

use std::{sync::Arc, time::Duration};

use crate::domain::{BroadcastBus, BusError, ConnectionRegistry, RoomEvent};

use super::relay::RoomRelay;

/// How an event reached its recipients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the bus; local connections receive it through the relay.
    Published,
    /// Delivered straight to `delivered` local connections.
    LocalFallback { delivered: usize },
}

pub struct RoomBroadcaster {
    bus: Arc<dyn BroadcastBus>,
    registry: Arc<ConnectionRegistry>,
    relay: Arc<RoomRelay>,
    timeout: Duration,
}

impl RoomBroadcaster {
    pub fn new(
        bus: Arc<dyn BroadcastBus>,
        registry: Arc<ConnectionRegistry>,
        relay: Arc<RoomRelay>,
        timeout: Duration,
    ) -> Self {
        Self {
            bus,
            registry,
            relay,
            timeout,
        }
    }

    pub async fn broadcast(&self, event: RoomEvent) -> Delivery {
        let room_id = event.room_id().clone();

        let published = match tokio::time::timeout(
            self.timeout,
            self.bus.publish(&room_id, event.clone()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout),
        };

        match published {
            Ok(()) if self.relay.is_active(&room_id) => Delivery::Published,
            Ok(()) => {
                tracing::debug!(room_id = %room_id, "no live relay for room, delivering locally");
                let delivered = self.registry.local_fanout(&room_id, &event);
                Delivery::LocalFallback { delivered }
            }
            Err(e) => {
                tracing::warn!(room_id = %room_id, "bus publish failed, delivering locally: {}", e);
                let delivered = self.registry.local_fanout(&room_id, &event);
                Delivery::LocalFallback { delivered }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            ConnectionHandle, PresenceCountEvent, RoomId, Timestamp, UserId,
            bus::MockBroadcastBus,
        },
        infrastructure::bus::InMemoryBroadcastBus,
    };
    use tokio::sync::mpsc;

    fn count_event(room_id: &RoomId, count: u64) -> RoomEvent {
        RoomEvent::OnlineUsersCount(PresenceCountEvent {
            room_id: room_id.clone(),
            count,
            observed_at: Timestamp::new(0),
        })
    }

    fn register(
        registry: &ConnectionRegistry,
        room_id: &RoomId,
        user_id: i64,
    ) -> mpsc::UnboundedReceiver<RoomEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.add(
            room_id,
            ConnectionHandle {
                id: registry.next_connection_id(),
                user_id: UserId::new(user_id).unwrap(),
                sender: tx,
            },
        );
        rx
    }

    #[tokio::test]
    async fn test_broadcast_falls_back_to_local_on_bus_failure() {
        // テスト項目: Bus への publish が失敗してもローカル接続には届く
        // given (前提条件):
        let mut bus = MockBroadcastBus::new();
        bus.expect_publish()
            .returning(|_, _| Err(BusError::Publish("connection refused".to_string())));
        let bus: Arc<dyn BroadcastBus> = Arc::new(bus);
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = Arc::new(RoomRelay::new(
            bus.clone(),
            registry.clone(),
            Duration::from_millis(100),
        ));
        let broadcaster =
            RoomBroadcaster::new(bus, registry.clone(), relay, Duration::from_millis(100));
        let room_id = RoomId::new("general".to_string()).unwrap();
        let mut rx = register(&registry, &room_id, 1);

        // when (操作):
        let delivery = broadcaster.broadcast(count_event(&room_id, 1)).await;

        // then (期待する結果):
        assert_eq!(delivery, Delivery::LocalFallback { delivered: 1 });
        assert_eq!(rx.recv().await, Some(count_event(&room_id, 1)));
    }

    #[tokio::test]
    async fn test_broadcast_goes_through_relay_when_subscribed() {
        // テスト項目: Relay が購読中なら Bus 経由で一度だけ届く
        // given (前提条件):
        let bus: Arc<dyn BroadcastBus> = Arc::new(InMemoryBroadcastBus::default());
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = Arc::new(RoomRelay::new(
            bus.clone(),
            registry.clone(),
            Duration::from_millis(100),
        ));
        let broadcaster = RoomBroadcaster::new(
            bus,
            registry.clone(),
            relay.clone(),
            Duration::from_millis(100),
        );
        let room_id = RoomId::new("general".to_string()).unwrap();
        let mut rx = register(&registry, &room_id, 1);
        relay.ensure_subscribed(&room_id).await.unwrap();

        // when (操作):
        let delivery = broadcaster.broadcast(count_event(&room_id, 1)).await;

        // then (期待する結果):
        assert_eq!(delivery, Delivery::Published);
        assert_eq!(rx.recv().await, Some(count_event(&room_id, 1)));
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }
}
