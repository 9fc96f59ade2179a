//! End-to-end tests of the chat WebSocket on a single server node.

mod common;

use common::{ALICE, BOB, CAROL, Cluster};
use lounge_server::{
    domain::RoomId,
    ui::{CLOSE_AUTH_FAILED, CLOSE_GOING_AWAY, CLOSE_INVALID_PAYLOAD},
};
use serde_json::json;

#[tokio::test]
async fn test_presence_count_sequence_for_repeated_user() {
    // テスト項目: A1, A2 (alice) と B1 (bob) の参加・退出で人数が 1, 1, 2, 2, 1 と推移する
    // given (前提条件):
    let cluster = Cluster::new();
    let server = cluster.spawn_node().await;
    let alice = cluster.token(ALICE);
    let bob = cluster.token(BOB);

    // when (操作):
    let mut a1 = server.connect("general", &alice).await;
    let after_a1 = a1.expect_count().await;

    let mut a2 = server.connect("general", &alice).await;
    let after_a2 = a2.expect_count().await;
    assert_eq!(a1.expect_count().await, after_a2);

    let mut b1 = server.connect("general", &bob).await;
    let after_b1 = b1.expect_count().await;
    assert_eq!(a1.expect_count().await, after_b1);
    assert_eq!(a2.expect_count().await, after_b1);

    a1.close().await;
    let after_a1_left = b1.expect_count().await;
    assert_eq!(a2.expect_count().await, after_a1_left);

    a2.close().await;
    let after_a2_left = b1.expect_count().await;

    // then (期待する結果):
    assert_eq!(
        vec![after_a1, after_a2, after_b1, after_a1_left, after_a2_left],
        vec![1, 1, 2, 2, 1]
    );
}

#[tokio::test]
async fn test_chat_reaches_every_connection_in_room_only() {
    // テスト項目: alice のメッセージは同じ Room の全接続に届き、別 Room には届かない
    // given (前提条件):
    let cluster = Cluster::new();
    let server = cluster.spawn_node().await;
    let alice = cluster.token(ALICE);
    let bob = cluster.token(BOB);
    let carol = cluster.token(CAROL);

    let mut a1 = server.connect("general", &alice).await;
    a1.expect_count().await;
    let mut a2 = server.connect("general", &alice).await;
    a1.expect_count().await;
    a2.expect_count().await;
    let mut b1 = server.connect("general", &bob).await;
    a1.expect_count().await;
    a2.expect_count().await;
    b1.expect_count().await;
    let mut c1 = server.connect("random", &carol).await;
    c1.expect_count().await;

    // when (操作):
    a1.send_chat(ALICE, "hi").await;

    // then (期待する結果):
    let expected = json!({"message": "hi", "user_id": ALICE, "username": "alice"});
    assert_eq!(b1.next_frame().await, expected);
    assert_eq!(a2.next_frame().await, expected);
    assert_eq!(a1.next_frame().await, expected);
    c1.expect_silence().await;

    let general = RoomId::new("general".to_string()).unwrap();
    let records = cluster.gateway.messages_in(&general).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content.as_str(), "hi");
}

#[tokio::test]
async fn test_malformed_frame_closes_only_offender() {
    // テスト項目: 壊れたフレームを送った接続だけが 1007 で閉じられ、他の接続は受信を続ける
    // given (前提条件):
    let cluster = Cluster::new();
    let server = cluster.spawn_node().await;
    let mut a1 = server.connect("general", &cluster.token(ALICE)).await;
    a1.expect_count().await;
    let mut b1 = server.connect("general", &cluster.token(BOB)).await;
    a1.expect_count().await;
    b1.expect_count().await;

    // when (操作):
    b1.send_text("{not json").await;

    // then (期待する結果):
    assert_eq!(b1.expect_close().await, CLOSE_INVALID_PAYLOAD);
    assert_eq!(a1.expect_count().await, 1);
    a1.send_chat(ALICE, "still here").await;
    assert_eq!(
        a1.next_frame().await,
        json!({"message": "still here", "user_id": ALICE, "username": "alice"})
    );
}

#[tokio::test]
async fn test_unknown_user_message_is_dropped_and_connection_stays() {
    // テスト項目: 未知ユーザーのメッセージは配信されず、接続は維持される
    // given (前提条件):
    let cluster = Cluster::new();
    let server = cluster.spawn_node().await;
    let mut a1 = server.connect("general", &cluster.token(ALICE)).await;
    a1.expect_count().await;

    // when (操作):
    a1.send_chat(999, "who am i").await;

    // then (期待する結果):
    a1.expect_silence().await;
    a1.send_chat(ALICE, "hello").await;
    assert_eq!(a1.next_frame().await["message"], "hello");
}

#[tokio::test]
async fn test_missing_token_is_rejected_with_auth_code() {
    // テスト項目: トークン無しの接続は 4001 で閉じられ、人数に数えられない
    // given (前提条件):
    let cluster = Cluster::new();
    let server = cluster.spawn_node().await;
    let mut observer = server.connect("general", &cluster.token(BOB)).await;
    observer.expect_count().await;

    // when (操作):
    let mut anonymous = common::TestClient::connect(&server.ws_url("general", None)).await;

    // then (期待する結果):
    assert_eq!(anonymous.expect_close().await, CLOSE_AUTH_FAILED);
    observer.expect_silence().await;
}

#[tokio::test]
async fn test_forged_token_is_rejected_with_auth_code() {
    // テスト項目: 別の secret で署名されたトークンは 4001 で閉じられる
    // given (前提条件):
    let cluster = Cluster::new();
    let server = cluster.spawn_node().await;
    let forged = lounge_server::infrastructure::auth::JwtAuthenticator::new("other-secret")
        .issue(
            lounge_server::domain::UserId::new(ALICE).unwrap(),
            chrono::Duration::hours(1),
        )
        .unwrap();

    // when (操作):
    let mut client = common::TestClient::connect(&server.ws_url("general", Some(&forged))).await;

    // then (期待する結果):
    assert_eq!(client.expect_close().await, CLOSE_AUTH_FAILED);
}

#[tokio::test]
async fn test_shutdown_closes_sessions_and_releases_presence() {
    // テスト項目: シャットダウン時に接続は 1001 で閉じられ、プレゼンスが返却される
    // given (前提条件):
    let cluster = Cluster::new();
    let mut server = cluster.spawn_node().await;
    let mut a1 = server.connect("general", &cluster.token(ALICE)).await;
    a1.expect_count().await;
    let context = server.context.clone();

    // when (操作):
    let close = tokio::spawn(async move { a1.expect_close().await });
    server.shutdown().await;

    // then (期待する結果):
    assert_eq!(close.await.unwrap(), CLOSE_GOING_AWAY);
    let general = RoomId::new("general".to_string()).unwrap();
    let snapshot = context.presence.snapshot(&general).await;
    assert_eq!(snapshot.online_users_count, 0);
}
