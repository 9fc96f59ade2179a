//! Helpers for the end-to-end tests: in-process server nodes sharing one
//! presence store and bus, and WebSocket test clients.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use lounge_server::{
    domain::{NodeId, RoomId, UserId, Username},
    infrastructure::{
        auth::JwtAuthenticator, bus::InMemoryBroadcastBus, gateway::InMemoryMessageGateway,
        presence::InMemoryPresenceStore,
    },
    ui::Server,
    usecase::SessionContext,
};
use lounge_shared::time::SystemClock;
use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub const SECRET: &str = "integration-test-secret";
pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;
pub const CAROL: i64 = 3;

const FRAME_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE: Duration = Duration::from_millis(200);

/// Backends shared by every node of one test, as Redis would be in production.
pub struct Cluster {
    presence: InMemoryPresenceStore,
    bus: InMemoryBroadcastBus,
    pub gateway: Arc<InMemoryMessageGateway>,
    authenticator: Arc<JwtAuthenticator>,
}

impl Cluster {
    pub fn new() -> Self {
        let clock = Arc::new(SystemClock);
        let gateway = InMemoryMessageGateway::new(clock.clone());
        for (id, name) in [(ALICE, "alice"), (BOB, "bob"), (CAROL, "carol")] {
            gateway.add_user(UserId::new(id).unwrap(), Username::new(name.to_string()).unwrap());
        }
        for room in ["general", "random"] {
            gateway.add_room(RoomId::new(room.to_string()).unwrap(), room.to_string());
        }

        Self {
            presence: InMemoryPresenceStore::new(
                NodeId::generate(),
                Duration::from_secs(30),
                clock,
            ),
            bus: InMemoryBroadcastBus::default(),
            gateway: Arc::new(gateway),
            authenticator: Arc::new(JwtAuthenticator::new(SECRET)),
        }
    }

    /// Start one more server process on an ephemeral port.
    pub async fn spawn_node(&self) -> TestServer {
        let context = Arc::new(SessionContext::new(
            self.authenticator.clone(),
            self.gateway.clone(),
            Arc::new(self.presence.for_node(NodeId::generate())),
            Arc::new(self.bus.clone()),
            Arc::new(SystemClock),
            Duration::from_millis(500),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = Server::new(context.clone(), Duration::from_secs(10));
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = shutdown_rx.await;
        }));

        TestServer {
            addr,
            context,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn token(&self, user_id: i64) -> String {
        self.authenticator
            .issue(UserId::new(user_id).unwrap(), chrono::Duration::hours(1))
            .unwrap()
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub context: Arc<SessionContext>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl TestServer {
    pub fn ws_url(&self, room: &str, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/ws/chat/{}/?token={}", self.addr, room, token),
            None => format!("ws://{}/ws/chat/{}/", self.addr, room),
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, room: &str, token: &str) -> TestClient {
        TestClient::connect(&self.ws_url(room, Some(token))).await
    }

    /// Trigger graceful shutdown and wait for it to finish.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("server did not shut down")
                .unwrap()
                .unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(url: &str) -> Self {
        let (stream, _response) = connect_async(url).await.expect("failed to connect");
        Self { stream }
    }

    pub async fn send_text(&mut self, text: &str) {
        self.stream.send(Message::text(text)).await.unwrap();
    }

    pub async fn send_chat(&mut self, user_id: i64, message: &str) {
        let frame = serde_json::json!({"message": message, "user_id": user_id});
        self.send_text(&frame.to_string()).await;
    }

    /// Next text frame as JSON. Panics on close or timeout.
    pub async fn next_frame(&mut self) -> Value {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .expect("timed out waiting for frame")
                .expect("connection ended")
                .expect("websocket error");
            match message {
                Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("expected text frame, got {:?}", other),
            }
        }
    }

    pub async fn expect_count(&mut self) -> u64 {
        let frame = self.next_frame().await;
        assert_eq!(frame["type"], "online_users_count", "unexpected frame {}", frame);
        frame["count"].as_u64().unwrap()
    }

    /// Wait for the server's close frame and return its code.
    pub async fn expect_close(&mut self) -> u16 {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .expect("timed out waiting for close")
                .expect("connection ended without close frame")
                .expect("websocket error");
            match message {
                Message::Close(Some(frame)) => return u16::from(frame.code),
                Message::Close(None) => panic!("close frame without code"),
                _ => continue,
            }
        }
    }

    /// Assert that no frame arrives for a short while.
    pub async fn expect_silence(&mut self) {
        if let Ok(message) = tokio::time::timeout(SILENCE, self.stream.next()).await {
            panic!("expected silence, got {:?}", message);
        }
    }

    /// Close from the client side and wait for the handshake to finish.
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
        let _ = tokio::time::timeout(FRAME_TIMEOUT, async {
            while let Some(Ok(_)) = self.stream.next().await {}
        })
        .await;
    }
}
