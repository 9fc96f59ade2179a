//! Redis Broadcast Bus 実装
//!
//! Topic per room on channel `{prefix}:room:{room_id}`. Publishing reuses a
//! shared `ConnectionManager`; each subscription owns a dedicated pub/sub
//! connection, which closes when the returned stream is dropped.

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;

use crate::{
    domain::{BroadcastBus, BusError, EventStream, RoomEvent, RoomId},
    infrastructure::dto::bus::BusEventDto,
};

#[derive(Clone)]
pub struct RedisBroadcastBus {
    client: redis::Client,
    manager: ConnectionManager,
    key_prefix: String,
}

impl RedisBroadcastBus {
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self, BusError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| BusError::Subscribe(e.to_string()))?;
        let manager = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;

        Ok(Self {
            client,
            manager,
            key_prefix: key_prefix.into(),
        })
    }

    fn channel(&self, topic: &RoomId) -> String {
        format!("{}:room:{}", self.key_prefix, topic)
    }
}

fn decode_message(msg: &redis::Msg) -> Option<RoomEvent> {
    let payload: String = match msg.get_payload() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(channel = msg.get_channel_name(), "non-text bus payload: {}", e);
            return None;
        }
    };

    let dto = match BusEventDto::decode(&payload) {
        Ok(dto) => dto,
        Err(e) => {
            tracing::warn!(channel = msg.get_channel_name(), "undecodable bus payload: {}", e);
            return None;
        }
    };

    match RoomEvent::try_from(dto) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(channel = msg.get_channel_name(), "invalid bus event: {}", e);
            None
        }
    }
}

#[async_trait]
impl BroadcastBus for RedisBroadcastBus {
    async fn publish(&self, topic: &RoomId, event: RoomEvent) -> Result<(), BusError> {
        let payload = BusEventDto::from(&event)
            .encode()
            .map_err(|e| BusError::Codec(e.to_string()))?;

        let mut conn = self.manager.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(self.channel(topic))
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;

        tracing::trace!(room_id = %topic, receivers, "event published");
        Ok(())
    }

    async fn subscribe(&self, topic: &RoomId) -> Result<EventStream, BusError> {
        let conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;
        let mut pubsub = conn.into_pubsub();
        pubsub
            .subscribe(self.channel(topic))
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;

        let events = pubsub
            .into_on_message()
            .filter_map(|msg| async move { decode_message(&msg) });
        Ok(events.boxed())
    }
}
