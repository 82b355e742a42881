// Integration tests for frame routing
//
// These tests drive JSON text frames through the router exactly as the
// WebSocket handler does and check the replies and resulting session state.

mod common;

use anyhow::Result;
use common::{drain, registry_in};
use loqa_ingest::{FrameRouter, OutboundFrame};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

async fn send(router: &FrameRouter, connection_id: &str, frame: Value) -> Value {
    let reply = router.route(connection_id, &frame.to_string()).await;
    serde_json::from_str(&reply.to_text()).unwrap()
}

#[tokio::test]
async fn test_full_session_over_frames() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, mut completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    let reply = send(&router, "conn-1", json!({"action": "start", "metaData": {"userId": "u1"}})).await;
    assert_eq!(reply["type"], "started");
    assert_eq!(reply["sessionId"], "conn-1");
    assert_eq!(reply["metaId"], "conn-1");

    let reply = send(
        &router,
        "conn-1",
        json!({"action": "data", "chunk": "data:audio/webm;base64,AAA="}),
    )
    .await;
    assert_eq!(reply["type"], "ack");
    assert_eq!(reply["bytes"], 2);

    let reply = send(&router, "conn-1", json!({"action": "heartbeat"})).await;
    assert_eq!(reply["type"], "heartbeat");
    assert_eq!(reply["tracked"], true);

    let reply = send(&router, "conn-1", json!({"action": "end"})).await;
    assert_eq!(reply["type"], "ended");
    assert_eq!(reply["sessionId"], "conn-1");
    assert!(reply["fileName"].as_str().unwrap().starts_with("conn-1_"));
    assert!(reply["completedAt"].is_string());

    let reply = send(&router, "conn-1", json!({"action": "end"})).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "NOT_FOUND");

    assert_eq!(drain(&mut completions).len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_unknown_action_is_not_fatal() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, _completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    let reply = send(&router, "c", json!({"action": "dance"})).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "INVALID_FRAME");
    assert!(reply["message"].as_str().unwrap().contains("dance"));

    let reply = router.route("c", "{not json").await;
    assert!(reply.is_error());

    // Connection keeps working afterwards
    let reply = send(&router, "c", json!({"action": "start", "metaData": {"userId": "u1"}})).await;
    assert_eq!(reply["type"], "started");

    Ok(())
}

#[tokio::test]
async fn test_client_cannot_claim_another_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, _completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    send(&router, "victim", json!({"action": "start", "metaData": {"userId": "u1"}})).await;

    let reply = send(
        &router,
        "attacker",
        json!({
            "action": "data",
            "sessionId": "victim",
            "connectionId": "victim",
            "chunk": "data:audio/webm;base64,AAA="
        }),
    )
    .await;
    assert_eq!(reply["code"], "NO_ACTIVE_SESSION");

    let reply = send(&router, "attacker", json!({"action": "end", "sessionId": "victim"})).await;
    assert_eq!(reply["code"], "NOT_FOUND");

    let victim = registry.get("victim").await.expect("victim still live");
    assert_eq!(victim.bytes_written, 0);

    Ok(())
}

#[tokio::test]
async fn test_decode_error_then_good_chunk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, _completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    send(&router, "c", json!({"action": "start", "metaData": {"userId": "u1"}})).await;

    let reply = send(&router, "c", json!({"action": "data", "chunk": "not-a-data-url"})).await;
    assert_eq!(reply["code"], "DECODE_ERROR");

    let reply = send(&router, "c", json!({"action": "data", "chunk": "data:audio/webm;base64,AAA="})).await;
    assert_eq!(reply["type"], "ack");
    assert_eq!(reply["totalBytes"], 2);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_start_reports_already_active() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, _completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    let start = json!({"action": "start", "metaData": {"userId": "u1"}, "metaId": "m"});
    send(&router, "c", start.clone()).await;
    let reply = send(&router, "c", start).await;
    assert_eq!(reply["code"], "ALREADY_ACTIVE");

    Ok(())
}

#[tokio::test]
async fn test_start_requires_user_id() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, _completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    let reply = send(&router, "c", json!({"action": "start", "metaData": {"userId": ""}})).await;
    assert_eq!(reply["code"], "INVALID_FRAME");
    assert!(registry.is_empty().await);

    Ok(())
}

#[tokio::test]
async fn test_heartbeat_without_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, _completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    let reply = send(&router, "c", json!({"action": "heartbeat"})).await;
    assert_eq!(reply["type"], "heartbeat");
    assert_eq!(reply["tracked"], false);

    Ok(())
}

#[tokio::test]
async fn test_legacy_action_names() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, mut completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    let reply = send(
        &router,
        "c",
        json!({"action": "record-start", "metaData": {"userId": "u1"}, "metaId": "legacy"}),
    )
    .await;
    assert_eq!(reply["metaId"], "legacy");

    let reply = send(
        &router,
        "c",
        json!({"action": "record-idle", "chunk": "data:audio/webm;base64,aGk="}),
    )
    .await;
    assert_eq!(reply["bytes"], 2);

    let reply = send(&router, "c", json!({"action": "record-end"})).await;
    assert_eq!(reply["type"], "ended");

    let records = drain(&mut completions);
    assert_eq!(records.len(), 1);
    assert_eq!(fs::read(&records[0].file_path)?, b"hi");

    Ok(())
}

#[tokio::test]
async fn test_connection_close_finalizes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, mut completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    send(&router, "c", json!({"action": "start", "metaData": {"userId": "u1"}})).await;
    router.connection_closed("c").await;

    assert!(registry.is_empty().await);
    assert_eq!(drain(&mut completions).len(), 1);

    // Closing again, or a connection that never started, is harmless
    router.connection_closed("c").await;
    router.connection_closed("never-started").await;
    assert!(drain(&mut completions).is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_frame_races_disconnect() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, mut completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    send(&router, "c", json!({"action": "start", "metaData": {"userId": "u1"}})).await;

    let closer = {
        let router = router.clone();
        tokio::spawn(async move { router.connection_closed("c").await })
    };
    let reply = router.route("c", r#"{"action":"end"}"#).await;
    closer.await?;

    match reply {
        OutboundFrame::Ended(_) => {}
        OutboundFrame::Error { code, .. } => assert_eq!(code, "NOT_FOUND"),
        other => panic!("Unexpected reply: {:?}", other),
    }
    assert_eq!(drain(&mut completions).len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_start_after_shutdown_is_refused() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (registry, mut completions) = registry_in(temp_dir.path());
    let router = FrameRouter::new(Arc::clone(&registry));

    registry.shutdown().await;

    // A socket still open after the server stopped
    let reply = send(&router, "late-conn", json!({"action": "start", "metaData": {"userId": "u1"}})).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "SHUTTING_DOWN");

    router.connection_closed("late-conn").await;
    assert!(registry.is_empty().await);
    assert!(drain(&mut completions).is_empty());

    Ok(())
}
