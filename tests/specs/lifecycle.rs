// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Create / start / stop across the full stack.

use super::helpers::*;
use life_core::ErrorCode;
use life_server::WorkerStatus;
use serde_json::json;

#[tokio::test]
async fn create_start_stop_round_trip() {
    let rig = rig(&["echo"]);

    let created = rig.server.create(None, "echo").unwrap();
    assert!(created.id.as_str().starts_with("agent_"));
    assert!(created.client_config.get("api_key").is_none(), "secret leaked to client view");

    let started = rig
        .server
        .start(&created.id, &json!({}), json!({ "user_id": "u1" }))
        .await
        .unwrap();
    assert_eq!(started.transport_room.name, format!("room_{}", created.id));
    assert_eq!(started.transport_room.token, format!("tok-user:{}", created.id));
    assert_eq!(rig.server.processes()[0].status, WorkerStatus::Running);

    // The real worker runtime is actually serving the session.
    let worker = rig.launcher.latest().unwrap();
    let host = worker.runtime.active_host().await.unwrap();
    assert_eq!(host.definition().name, "echo");

    rig.server.stop(&created.id, &started.session_token).await.unwrap();
    assert!(rig.server.processes().is_empty());
    assert!(worker.runtime.active_host().await.is_none());
}

#[tokio::test]
async fn wrong_session_token_is_forbidden_and_harmless() {
    let rig = rig(&["echo"]);
    let created = rig.server.create(None, "echo").unwrap();
    let started = rig.server.start(&created.id, &json!({}), json!({})).await.unwrap();

    let err = rig.server.agent_ping(&created.id, "xyz").unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
    let err = rig.server.stop(&created.id, "xyz").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);

    // Status unchanged; the right token still works.
    assert_eq!(rig.server.processes()[0].status, WorkerStatus::Running);
    assert_eq!(rig.server.agent_ping(&created.id, &started.session_token).unwrap(), "pong");
}

#[tokio::test]
async fn starting_an_unknown_agent_name_fails_at_create() {
    let rig = rig(&["echo"]);
    let err = rig.server.create(None, "ghost").unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn restart_preserves_identity_and_counts() {
    let rig = rig(&["echo"]);
    let created = rig.server.create(None, "echo").unwrap();
    let started = rig.server.start(&created.id, &json!({}), json!({})).await.unwrap();

    rig.server.restart(&created.id, &started.session_token).await.unwrap();

    let info = rig.server.agent_info(&created.id, &started.session_token).await.unwrap();
    assert_eq!(info.status, WorkerStatus::Running);
    assert_eq!(info.restart_count, 1);
    assert_eq!(rig.launcher.launch_count(), 2);
}

#[tokio::test]
async fn agent_info_reflects_the_worker() {
    let rig = rig(&["echo"]);
    let created = rig.server.create(None, "echo").unwrap();
    let started = rig
        .server
        .start(&created.id, &json!({}), json!({ "user_id": "u7" }))
        .await
        .unwrap();

    let info = rig.server.agent_info(&created.id, &started.session_token).await.unwrap();
    assert_eq!(info.name, "echo");
    assert_eq!(info.scope, Some(json!({ "user_id": "u7" })));
    assert!(info.last_started_at.is_some());
    // Child stats come over the control channel from the live runtime.
    assert!(info.memory_bytes.unwrap_or(0) > 0);
}

#[tokio::test]
async fn available_and_host_info_work_without_auth() {
    let rig = rig(&["echo", "calc"]);
    let available = rig.server.available();
    assert_eq!(available.len(), 2);

    let info = rig.server.ping();
    assert!(!info.life_version.is_empty());
    assert!(info.stats.memory.total > 0);
}
