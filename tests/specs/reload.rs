// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hot reload: a changed signal file restarts exactly the matching agents.

use super::helpers::*;
use life_server::WorkerStatus;
use serde_json::json;

#[tokio::test]
async fn changed_definition_restarts_matching_workers_only() {
    let rig = rig(&["echo", "calc"]);

    let echo = rig.server.create(None, "echo").unwrap();
    let echo_started = rig.server.start(&echo.id, &json!({}), json!({})).await.unwrap();
    let calc = rig.server.create(None, "calc").unwrap();
    let calc_started = rig.server.start(&calc.id, &json!({}), json!({})).await.unwrap();
    assert_eq!(rig.launcher.launch_count(), 2);
    let calc_worker = rig.launcher.latest().unwrap();

    // Signal change for echo only.
    write_definition(rig.build_dir(), "echo", "changed greeting");
    let restarted = rig.server.definition_changed("echo").await.unwrap();
    assert_eq!(restarted, 1);
    assert_eq!(rig.launcher.launch_count(), 3);

    // Echo came back; calc never moved.
    let echo_info = rig.server.agent_info(&echo.id, &echo_started.session_token).await.unwrap();
    assert_eq!(echo_info.status, WorkerStatus::Running);
    assert_eq!(echo_info.restart_count, 1);

    let calc_info = rig.server.agent_info(&calc.id, &calc_started.session_token).await.unwrap();
    assert_eq!(calc_info.status, WorkerStatus::Running);
    assert_eq!(calc_info.restart_count, 0);
    assert!(calc_worker.runtime.active_host().await.is_some());
}

#[tokio::test]
async fn unchanged_signal_content_causes_no_restarts() {
    let rig = rig(&["echo"]);
    let echo = rig.server.create(None, "echo").unwrap();
    rig.server.start(&echo.id, &json!({}), json!({})).await.unwrap();

    // Rewrite identical bytes: hash matches, nothing happens.
    write_definition(rig.build_dir(), "echo", "hi");
    assert_eq!(rig.server.definition_changed("echo").await.unwrap(), 0);
    assert_eq!(rig.launcher.launch_count(), 1);
}

#[tokio::test]
async fn reloaded_definition_is_served_to_new_workers() {
    let rig = rig(&["echo"]);

    write_definition(rig.build_dir(), "echo", "updated");
    rig.server.definition_changed("echo").await.unwrap();

    let created = rig.server.create(None, "echo").unwrap();
    assert_eq!(created.client_config.get("greeting"), Some(&json!("updated")));
}
