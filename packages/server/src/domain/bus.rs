//! Broadcast Bus port.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::{entity::RoomEvent, error::BusError, value_object::RoomId};

/// Stream of events published to one topic.
pub type EventStream = BoxStream<'static, RoomEvent>;

/// Pub/sub across backend processes, one topic per room.
///
/// Delivery is at-least-once to every current subscriber. Ordering within a
/// topic follows publish order on a best-effort basis only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BroadcastBus: Send + Sync {
    async fn publish(&self, topic: &RoomId, event: RoomEvent) -> Result<(), BusError>;

    async fn subscribe(&self, topic: &RoomId) -> Result<EventStream, BusError>;
}
