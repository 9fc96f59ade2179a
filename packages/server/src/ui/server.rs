//! Server execution logic.

use std::{future::Future, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;

use crate::usecase::{SessionContext, spawn_presence_heartbeat};

use super::{
    handler::{http::health_check, http::room_presence, websocket::websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// WebSocket chat server
///
/// # Example
///
/// ```ignore
/// let context = Arc::new(SessionContext::new(
///     authenticator, gateway, presence_store, bus, clock, store_timeout,
/// ));
/// let server = Server::new(context, Duration::from_secs(10));
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    context: Arc<SessionContext>,
    /// Interval of presence lease renewal
    heartbeat_interval: Duration,
}

impl Server {
    pub fn new(context: Arc<SessionContext>, heartbeat_interval: Duration) -> Self {
        Self {
            context,
            heartbeat_interval,
        }
    }

    /// Build the router. Open WebSocket sessions close once `shutdown` flips
    /// to `true`.
    pub fn router(&self, shutdown: watch::Receiver<bool>) -> Router {
        let app_state = Arc::new(AppState {
            context: Arc::clone(&self.context),
            shutdown,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws/chat/{room_id}", get(websocket_handler))
            .route("/ws/chat/{room_id}/", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/rooms/{room_id}/presence", get(room_presence))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Bind to `host:port` and serve until Ctrl+C / SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> std::io::Result<()> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Lounge chat server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws/chat/{{room_id}}/?token=...", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `signal` resolves, then close
    /// open sessions and withdraw this process's presence.
    pub async fn serve(
        self,
        listener: TcpListener,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let heartbeat = spawn_presence_heartbeat(
            Arc::clone(&self.context.presence),
            Arc::clone(&self.context.relay),
            self.heartbeat_interval,
            shutdown_rx.clone(),
        );
        let app = self.router(shutdown_rx);

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                signal.await;
                let _ = shutdown_tx.send(true);
            })
            .await;

        if let Err(e) = heartbeat.await {
            tracing::warn!("Presence heartbeat task failed: {}", e);
        }
        self.context.shutdown().await;
        tracing::info!("Server shutdown complete");

        result
    }
}
