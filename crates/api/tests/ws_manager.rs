//! Tests for `WsManager` and the batch event forwarder, without HTTP upgrades.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use common::{build_test_app, host, StubFactory};
use rollout_api::engine::forwarder::spawn_event_forwarder;
use rollout_api::ws::{start_heartbeat, WsManager};
use rollout_core::update::UpdateRequest;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn text(msg: &Message) -> &str {
    match msg {
        Message::Text(t) => t.as_str(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

async fn recv_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("frame in time")
        .expect("channel open");
    serde_json::from_str(text(&msg)).unwrap()
}

// ---------------------------------------------------------------------------
// Test: add/remove bookkeeping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let manager = WsManager::new();
    assert_eq!(manager.connection_count().await, 0);

    let _rx1 = manager.add("conn-1".to_string()).await;
    let _rx2 = manager.add("conn-2".to_string()).await;
    assert_eq!(manager.connection_count().await, 2);
    assert!(manager.oldest_connection_secs().await.is_some());

    manager.remove("conn-1").await;
    manager.remove("nonexistent").await;
    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: broadcast_json reaches every open connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_json_skips_closed_channels() {
    let manager = WsManager::new();

    let rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;
    drop(rx1);

    manager
        .broadcast_json(&serde_json::json!({ "type": "batch_cancelling" }))
        .await;

    let json = recv_json(&mut rx2).await;
    assert_eq!(json["type"], "batch_cancelling");
}

// ---------------------------------------------------------------------------
// Test: send_to targets a single connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_to_targets_one_connection() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;

    assert!(manager.send_to("conn-2", Message::Text("only you".into())).await);
    assert!(!manager.send_to("ghost", Message::Text("nobody".into())).await);

    let msg = rx2.recv().await.unwrap();
    assert_eq!(text(&msg), "only you");
    assert!(rx1.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: ping_all and shutdown_all
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_then_shutdown_closes_everything() {
    let manager = WsManager::new();
    let mut rx = manager.add("conn-1".to_string()).await;

    manager.ping_all().await;
    assert!(matches!(rx.recv().await, Some(Message::Ping(_))));

    manager.shutdown_all().await;
    assert_eq!(manager.connection_count().await, 0);
    assert!(matches!(rx.recv().await, Some(Message::Close(None))));
    assert!(rx.recv().await.is_none(), "channel closed after shutdown");
}

// ---------------------------------------------------------------------------
// Test: the heartbeat prunes connections whose receiver is gone
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_all_prunes_closed_connections() {
    let manager = WsManager::new();
    let _live = manager.add("live".to_string()).await;
    let gone = manager.add("gone".to_string()).await;
    drop(gone);

    assert_eq!(manager.ping_all().await, 1);
    assert_eq!(manager.connection_count().await, 1);
}

#[tokio::test]
async fn heartbeat_pings_until_dropped() {
    let manager = Arc::new(WsManager::new());
    let mut rx = manager.add("conn-1".to_string()).await;

    let heartbeat = start_heartbeat(Arc::clone(&manager), Duration::from_millis(20));
    let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("ping in time");
    assert!(matches!(frame, Some(Message::Ping(_))));

    drop(heartbeat);
    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: the forwarder relays orchestrator events in order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forwarder_relays_batch_events() {
    let app = build_test_app(
        vec![host("nas", "Actual", &["web"])],
        StubFactory::new().agent("Actual"),
    );
    let mut rx = app.state.ws_manager.add("browser".to_string()).await;

    let cancel = CancellationToken::new();
    let handle = spawn_event_forwarder(
        app.state.orchestrator.clone(),
        app.state.ws_manager.clone(),
        cancel.clone(),
    );

    let run = app
        .state
        .orchestrator
        .start(vec![UpdateRequest::new("web", "Actual")])
        .await
        .unwrap();

    let first = recv_json(&mut rx).await;
    assert_eq!(first["type"], "batch_started");
    assert_eq!(first["batch_id"], run.id.to_string());

    loop {
        let frame = recv_json(&mut rx).await;
        assert_eq!(frame["batch_id"], run.id.to_string());
        if frame["type"] == "batch_completed" {
            assert_eq!(frame["report"]["succeeded"], 1);
            break;
        }
    }

    cancel.cancel();
    handle.await.unwrap();
}
