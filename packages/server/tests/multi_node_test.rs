//! End-to-end tests with two server nodes sharing one presence store and bus.

mod common;

use common::{ALICE, BOB, Cluster};
use lounge_server::infrastructure::dto::http::RoomPresenceDto;
use serde_json::json;

#[tokio::test]
async fn test_same_user_on_two_nodes_counts_once() {
    // テスト項目: 別ノードに同じユーザーが接続しても 1 人、片方が切れても人数は変わらない
    // given (前提条件):
    let cluster = Cluster::new();
    let node_a = cluster.spawn_node().await;
    let node_b = cluster.spawn_node().await;
    let alice = cluster.token(ALICE);
    let bob = cluster.token(BOB);

    // when (操作):
    let mut a1 = node_a.connect("general", &alice).await;
    assert_eq!(a1.expect_count().await, 1);
    let mut a2 = node_b.connect("general", &alice).await;
    assert_eq!(a2.expect_count().await, 1);
    assert_eq!(a1.expect_count().await, 1);
    let mut b1 = node_b.connect("general", &bob).await;
    assert_eq!(b1.expect_count().await, 2);
    assert_eq!(a1.expect_count().await, 2);
    assert_eq!(a2.expect_count().await, 2);

    a1.close().await;

    // then (期待する結果):
    assert_eq!(b1.expect_count().await, 2);
    assert_eq!(a2.expect_count().await, 2);

    a2.close().await;
    assert_eq!(b1.expect_count().await, 1);
}

#[tokio::test]
async fn test_chat_crosses_nodes() {
    // テスト項目: 一方のノードで送ったメッセージが他方のノードの接続にも届く
    // given (前提条件):
    let cluster = Cluster::new();
    let node_a = cluster.spawn_node().await;
    let node_b = cluster.spawn_node().await;
    let mut a1 = node_a.connect("general", &cluster.token(ALICE)).await;
    a1.expect_count().await;
    let mut b1 = node_b.connect("general", &cluster.token(BOB)).await;
    b1.expect_count().await;
    a1.expect_count().await;

    // when (操作):
    a1.send_chat(ALICE, "hi").await;

    // then (期待する結果):
    let expected = json!({"message": "hi", "user_id": ALICE, "username": "alice"});
    assert_eq!(b1.next_frame().await, expected);
    assert_eq!(a1.next_frame().await, expected);
    b1.expect_silence().await;
}

#[tokio::test]
async fn test_presence_endpoint_reports_cluster_count() {
    // テスト項目: presence API はクラスタ全体の人数とノードごとの接続数を返す
    // given (前提条件):
    let cluster = Cluster::new();
    let node_a = cluster.spawn_node().await;
    let node_b = cluster.spawn_node().await;
    let mut a1 = node_a.connect("general", &cluster.token(ALICE)).await;
    a1.expect_count().await;
    let mut b1 = node_b.connect("general", &cluster.token(BOB)).await;
    b1.expect_count().await;

    // when (操作):
    let response = reqwest::get(node_a.http_url("/api/rooms/general/presence"))
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let presence: RoomPresenceDto = response.json().await.unwrap();
    assert_eq!(
        presence,
        RoomPresenceDto {
            room_id: "general".to_string(),
            online_users_count: 2,
            local_connections: 1,
            degraded: false,
        }
    );
}

#[tokio::test]
async fn test_health_and_invalid_room_id() {
    // テスト項目: ヘルスチェックは ok を返し、不正な Room ID は 400 になる
    // given (前提条件):
    let cluster = Cluster::new();
    let node = cluster.spawn_node().await;

    // when (操作):
    let health = reqwest::get(node.http_url("/api/health")).await.unwrap();
    let invalid = reqwest::get(node.http_url("/api/rooms/bad%20room/presence"))
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = health.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
    assert_eq!(invalid.status(), reqwest::StatusCode::BAD_REQUEST);
}
