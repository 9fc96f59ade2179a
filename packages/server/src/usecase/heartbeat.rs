//! Presence lease heartbeat.
//!
//! Each tick renews this process's leases, resubscribes rooms whose relay
//! died and broadcasts counts that moved without a local join or leave
//! (another node's leases expiring).

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use super::{presence::PresenceTracker, relay::RoomRelay};

/// Run the heartbeat every `interval` until `shutdown` flips to `true` (or its
/// sender is dropped).
pub fn spawn_presence_heartbeat(
    tracker: Arc<PresenceTracker>,
    relay: Arc<RoomRelay>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracker.refresh_leases().await;
                    relay.resubscribe_stale().await;
                    tracker.broadcast_changed_counts().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("presence heartbeat stopped");
    })
}
