//! InMemory Broadcast Bus 実装
//!
//! Cloned handles share topics, so two registries wired to clones of one bus
//! behave like two backend processes on a shared broker. A topic exists only
//! while it has subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{StreamExt, stream};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::domain::{BroadcastBus, BusError, EventStream, RoomEvent, RoomId};

const DEFAULT_TOPIC_CAPACITY: usize = 256;

type Topics = DashMap<RoomId, broadcast::Sender<RoomEvent>>;

#[derive(Debug, Clone)]
pub struct InMemoryBroadcastBus {
    topics: Arc<Topics>,
    capacity: usize,
}

impl Default for InMemoryBroadcastBus {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl InMemoryBroadcastBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity,
        }
    }

    pub fn subscriber_count(&self, topic: &RoomId) -> usize {
        self.topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

/// One subscriber's receiver. Dropping the last subscription of a topic
/// removes the topic.
struct Subscription {
    topic: RoomId,
    topics: Arc<Topics>,
    receiver: Option<broadcast::Receiver<RoomEvent>>,
}

impl Subscription {
    async fn next_event(&mut self) -> Option<RoomEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(room_id = %self.topic, skipped, "bus subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        drop(self.receiver.take());
        self.topics
            .remove_if(&self.topic, |_, sender| sender.receiver_count() == 0);
    }
}

#[async_trait]
impl BroadcastBus for InMemoryBroadcastBus {
    async fn publish(&self, topic: &RoomId, event: RoomEvent) -> Result<(), BusError> {
        // No subscriber is not an error: nobody in the room needs the event
        if let Some(sender) = self.topics.get(topic) {
            let _ = sender.send(event);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &RoomId) -> Result<EventStream, BusError> {
        // Subscribe under the entry lock so a concurrent drop cannot remove
        // the topic between lookup and subscribe
        let receiver = self
            .topics
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        let subscription = Subscription {
            topic: topic.clone(),
            topics: Arc::clone(&self.topics),
            receiver: Some(receiver),
        };

        let events = stream::unfold(subscription, |mut subscription| async move {
            let event = subscription.next_event().await?;
            Some((event, subscription))
        });
        Ok(events.boxed())
    }
}
