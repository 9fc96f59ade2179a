//! UseCase: Bus → ローカル接続への中継
//!
//! One bus subscription per room that has local connections. A pump task
//! drains the subscription into [`ConnectionRegistry::local_fanout`].

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::domain::{BroadcastBus, BusError, ConnectionRegistry, EventStream, RoomId};

type PumpSlot = Arc<Mutex<Option<JoinHandle<()>>>>;

pub struct RoomRelay {
    bus: Arc<dyn BroadcastBus>,
    registry: Arc<ConnectionRegistry>,
    timeout: Duration,
    pumps: DashMap<RoomId, PumpSlot>,
}

impl RoomRelay {
    pub fn new(
        bus: Arc<dyn BroadcastBus>,
        registry: Arc<ConnectionRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            bus,
            registry,
            timeout,
            pumps: DashMap::new(),
        }
    }

    /// Make sure a live subscription pumps `room_id` into the registry.
    ///
    /// A pump whose stream has ended is replaced by a fresh subscription.
    pub async fn ensure_subscribed(&self, room_id: &RoomId) -> Result<(), BusError> {
        let slot = self.slot(room_id);
        let mut pump = slot.lock().await;

        if pump.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let events = match tokio::time::timeout(self.timeout, self.bus.subscribe(room_id)).await {
            Ok(result) => result?,
            Err(_) => return Err(BusError::Timeout),
        };

        tracing::debug!(room_id = %room_id, "room relay subscribed");
        *pump = Some(tokio::spawn(run_pump(
            events,
            Arc::clone(&self.registry),
            room_id.clone(),
        )));
        Ok(())
    }

    /// Drop the subscription once the room has no local connection left.
    pub async fn release_if_idle(&self, room_id: &RoomId) {
        let Some(slot) = self.pumps.get(room_id).map(|slot| Arc::clone(&slot)) else {
            return;
        };

        {
            let mut pump = slot.lock().await;
            if self.registry.has_connections(room_id) {
                return;
            }
            if let Some(handle) = pump.take() {
                handle.abort();
                tracing::debug!(room_id = %room_id, "room relay released");
            }
        }
        drop(slot);

        self.pumps.remove_if(room_id, |_, slot| {
            Arc::strong_count(slot) == 1
                && slot.try_lock().map(|pump| pump.is_none()).unwrap_or(false)
        });
    }

    /// Resubscribe every room that still has local connections but whose
    /// pump is gone, e.g. after the bus connection dropped.
    ///
    /// Returns the number of rooms that got a fresh subscription.
    pub async fn resubscribe_stale(&self) -> usize {
        let mut resubscribed = 0;
        for room_id in self.registry.rooms() {
            if self.is_active(&room_id) {
                continue;
            }
            match self.ensure_subscribed(&room_id).await {
                Ok(()) => {
                    tracing::info!(room_id = %room_id, "room relay resubscribed");
                    resubscribed += 1;
                    // The last connection may have left while subscribing
                    self.release_if_idle(&room_id).await;
                }
                Err(e) => {
                    tracing::warn!(room_id = %room_id, "room relay resubscribe failed: {}", e);
                }
            }
        }
        resubscribed
    }

    /// Whether events published to `room_id` currently reach local connections.
    pub fn is_active(&self, room_id: &RoomId) -> bool {
        self.pumps
            .get(room_id)
            .is_some_and(|slot| is_live(&slot))
    }

    pub fn active_rooms(&self) -> usize {
        self.pumps.iter().filter(|entry| is_live(entry.value())).count()
    }

    /// Stop every pump.
    pub async fn shutdown(&self) {
        let slots: Vec<PumpSlot> = self
            .pumps
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for slot in slots {
            if let Some(handle) = slot.lock().await.take() {
                handle.abort();
            }
        }
        self.pumps.clear();
    }

    fn slot(&self, room_id: &RoomId) -> PumpSlot {
        Arc::clone(&self.pumps.entry(room_id.clone()).or_default())
    }
}

fn is_live(slot: &PumpSlot) -> bool {
    match slot.try_lock() {
        Ok(pump) => pump.as_ref().is_some_and(|handle| !handle.is_finished()),
        // A subscription is being set up right now
        Err(_) => true,
    }
}

async fn run_pump(mut events: EventStream, registry: Arc<ConnectionRegistry>, room_id: RoomId) {
    while let Some(event) = events.next().await {
        if event.room_id() != &room_id {
            tracing::warn!(room_id = %room_id, other = %event.room_id(), "event for another room on topic, ignoring");
            continue;
        }
        let delivered = registry.local_fanout(&room_id, &event);
        tracing::trace!(room_id = %room_id, delivered, "bus event relayed");
    }
    tracing::warn!(room_id = %room_id, "bus subscription ended");
}
