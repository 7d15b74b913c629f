// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery: auto-restart and plugin-context replay.

use super::helpers::*;
use life_server::WorkerStatus;
use serde_json::json;
use std::time::Duration;

async fn wait_running(rig: &Rig, launches: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if rig.launcher.launch_count() >= launches
            && rig.server.processes().first().map(|p| p.status) == Some(WorkerStatus::Running)
        {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "worker never came back");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn a_crashed_worker_is_restarted_with_its_plugin_state() {
    let rig = rig(&["echo"]);
    let created = rig.server.create(None, "echo").unwrap();
    let started = rig.server.start(&created.id, &json!({}), json!({})).await.unwrap();

    // The plugin accumulates state, mirrored to the supervisor.
    let worker = rig.launcher.latest().unwrap();
    let host = worker.runtime.active_host().await.unwrap();
    host.plugin("memory").unwrap().set_context(json!({ "turns": 5 }));

    // Give the async context sync a moment to land in the supervisor.
    tokio::time::sleep(Duration::from_millis(100)).await;

    worker.crash();
    wait_running(&rig, 2).await;

    // The replacement runtime was constructed with the restored snapshot.
    let replacement = rig.launcher.latest().unwrap();
    let host = replacement.runtime.active_host().await.unwrap();
    assert_eq!(host.plugin("memory").unwrap().context(), json!({ "turns": 5 }));

    let info = rig.server.agent_info(&created.id, &started.session_token).await.unwrap();
    assert_eq!(info.restart_count, 1);
}

#[tokio::test]
async fn the_session_token_survives_a_crash_restart() {
    let rig = rig(&["echo"]);
    let created = rig.server.create(None, "echo").unwrap();
    let started = rig.server.start(&created.id, &json!({}), json!({})).await.unwrap();

    rig.launcher.latest().unwrap().crash();
    wait_running(&rig, 2).await;

    assert_eq!(
        rig.server.agent_ping(&created.id, &started.session_token).unwrap(),
        "pong"
    );
}
