// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::scripted::ScriptedLauncher;
use super::*;
use life_ipc::WorkerCommand;
use serde_json::json;
use std::sync::atomic::Ordering;

fn noop_handler() -> ControlHandler {
    Arc::new(|_| Box::pin(async { Ok(json!(null)) }))
}

fn ctx() -> LaunchCtx {
    LaunchCtx {
        agent_id: AgentId::from_string("agent_l1"),
        agent_name: "echo".into(),
        handler: noop_handler(),
        env: vec![("LIFE_TELEMETRY_DISABLED".into(), "1".into())],
    }
}

#[tokio::test]
async fn scripted_worker_answers_ping() {
    let launcher = ScriptedLauncher::new();
    let worker = launcher.launch(ctx()).await.unwrap();
    let out = worker.channel().call(&WorkerCommand::Ping).await.unwrap();
    assert_eq!(out, json!("pong"));
}

#[tokio::test]
async fn scripted_launch_failures_count_down() {
    let launcher = ScriptedLauncher::new();
    launcher.behavior.failing_launches.store(2, Ordering::Relaxed);

    assert!(launcher.launch(ctx()).await.is_err());
    assert!(launcher.launch(ctx()).await.is_err());
    assert!(launcher.launch(ctx()).await.is_ok());
    assert_eq!(launcher.launch_count(), 3);
}

#[tokio::test]
async fn crash_cancels_the_exit_token() {
    let launcher = ScriptedLauncher::new();
    let worker = launcher.launch(ctx()).await.unwrap();
    let exited = worker.exited();
    assert!(!exited.is_cancelled());

    launcher.latest().unwrap().crash();
    exited.cancelled().await;
}

#[tokio::test]
async fn force_kill_is_repeatable() {
    let launcher = ScriptedLauncher::new();
    let worker = launcher.launch(ctx()).await.unwrap();
    worker.force_kill();
    worker.force_kill();
    assert!(worker.exited().is_cancelled());
}

#[test]
#[serial_test::serial]
fn process_launcher_prefers_the_env_override() {
    // Isolated from the real env by using a scoped guard value.
    std::env::set_var(ENV_WORKER_BINARY, "/opt/life/bin/life-worker");
    let launcher = ProcessLauncher::from_env().unwrap();
    std::env::remove_var(ENV_WORKER_BINARY);

    // Nothing to assert beyond construction: the path is used at spawn.
    let _ = launcher;
}
