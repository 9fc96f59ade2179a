//! Startup wiring: build the backends selected by [`ServerConfig`] and the
//! session context around them.

use std::sync::Arc;

use lounge_shared::time::{Clock, SystemClock};
use thiserror::Error;

use crate::{
    config::ServerConfig,
    domain::{BroadcastBus, BusError, NodeId, PresenceError, PresenceStore},
    infrastructure::{
        auth::JwtAuthenticator,
        bus::{InMemoryBroadcastBus, RedisBroadcastBus},
        gateway::{Directory, DirectoryError, InMemoryMessageGateway},
        presence::{InMemoryPresenceStore, RedisPresenceStore},
    },
    usecase::SessionContext,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("failed to connect presence store: {0}")]
    Presence(#[from] PresenceError),

    #[error("failed to connect broadcast bus: {0}")]
    Bus(#[from] BusError),
}

pub async fn build_context(config: &ServerConfig) -> Result<SessionContext, StartupError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let node_id = NodeId::generate();
    tracing::info!(node_id = %node_id, "Starting node");

    // 1. Message Gateway
    let directory = match &config.directory {
        Some(path) => Directory::load(path)?,
        None => {
            tracing::warn!("No directory file given, the message gateway knows no users or rooms");
            Directory::default()
        }
    };
    let gateway = InMemoryMessageGateway::from_directory(&directory, Arc::clone(&clock))?;
    tracing::info!(
        users = gateway.user_count(),
        rooms = gateway.room_count(),
        "Message gateway loaded"
    );

    // 2. Presence Store and Broadcast Bus
    let (presence_store, bus): (Arc<dyn PresenceStore>, Arc<dyn BroadcastBus>) =
        match &config.redis_url {
            Some(url) => {
                let store = RedisPresenceStore::connect(
                    url,
                    node_id,
                    config.key_prefix.clone(),
                    config.presence_ttl(),
                    Arc::clone(&clock),
                )
                .await?;
                let bus = RedisBroadcastBus::connect(url, config.key_prefix.clone()).await?;
                tracing::info!("Using Redis presence store and broadcast bus");
                (Arc::new(store), Arc::new(bus))
            }
            None => {
                tracing::info!("Using in-process presence store and broadcast bus");
                (
                    Arc::new(InMemoryPresenceStore::new(
                        node_id,
                        config.presence_ttl(),
                        Arc::clone(&clock),
                    )),
                    Arc::new(InMemoryBroadcastBus::default()),
                )
            }
        };

    // 3. Session context
    Ok(SessionContext::new(
        Arc::new(JwtAuthenticator::new(&config.jwt_secret)),
        Arc::new(gateway),
        presence_store,
        bus,
        clock,
        config.store_timeout(),
    ))
}
