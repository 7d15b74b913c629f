// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::agent::TransportConnector;
use async_trait::async_trait;
use life_core::ErrorCode;
use life_ipc::ControlHandler;
use life_transport::{LocalHub, TransportSession};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

struct HubConnector {
    hub: Arc<LocalHub>,
}

#[async_trait]
impl TransportConnector for HubConnector {
    async fn connect(&self) -> Result<Arc<dyn TransportSession>, Fault> {
        Ok(Arc::new(self.hub.session("agent")))
    }
}

fn write_definition(dir: &std::path::Path, name: &str) {
    let definition = json!({
        "name": name,
        "scope": { "schema": { "type": "object" }, "access": { "kind": "open" } },
        "plugins": [{ "name": "memory" }],
        "source": format!("/app/agents/{}/agent.ts", name),
        "config": { "path": format!("/app/agents/{}/config.json", name), "values": {} },
    });
    std::fs::write(
        dir.join(format!("{}.json", name)),
        serde_json::to_vec(&definition).unwrap(),
    )
    .unwrap();
}

struct Harness {
    supervisor: Arc<ControlChannel>,
    runtime: Arc<WorkerRuntime>,
    from_worker: tokio::sync::mpsc::UnboundedReceiver<SupervisorCommand>,
    hub: Arc<LocalHub>,
    _dir: tempfile::TempDir,
}

fn record_handler(tx: UnboundedSender<SupervisorCommand>) -> ControlHandler {
    Arc::new(move |body| {
        let tx = tx.clone();
        Box::pin(async move {
            if let Ok(command) = serde_json::from_value::<SupervisorCommand>(body) {
                let _ = tx.send(command);
            }
            Ok(json!(null))
        })
    })
}

async fn harness(agents: &[&str]) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    for agent in agents {
        write_definition(dir.path(), agent);
    }

    let hub = LocalHub::new();
    let runtime = WorkerRuntime::new(WorkerDeps {
        build_dir: dir.path().to_path_buf(),
        connector: Arc::new(HubConnector { hub: Arc::clone(&hub) }),
        providers: Some(super::ProviderOverrides::default()),
    });

    let (worker_io, supervisor_io) = tokio::io::duplex(64 * 1024);
    let (worker_read, worker_write) = tokio::io::split(worker_io);
    let (supervisor_read, supervisor_write) = tokio::io::split(supervisor_io);

    let worker_channel =
        Arc::new(ControlChannel::spawn(worker_read, worker_write, runtime.handler()));
    runtime.attach_supervisor(worker_channel);

    let (tx, from_worker) = unbounded_channel();
    let supervisor =
        Arc::new(ControlChannel::spawn(supervisor_read, supervisor_write, record_handler(tx)));

    Harness { supervisor, runtime, from_worker, hub, _dir: dir }
}

fn start_params(name: &str) -> StartParams {
    StartParams {
        id: life_core::AgentId::from_string("agent_test1"),
        name: name.into(),
        scope: json!({}),
        transport_room: life_core::RoomGrant { name: "room_agent_test1".into(), token: "t".into() },
        plugins_contexts: Default::default(),
        is_restart: false,
    }
}

#[tokio::test]
async fn start_brings_the_session_up_and_sends_ready() {
    let mut h = harness(&["echo"]).await;

    h.supervisor
        .call(&WorkerCommand::Start(start_params("echo")))
        .await
        .unwrap();

    // Ready arrives as the worker's own request.
    match h.from_worker.recv().await.unwrap() {
        SupervisorCommand::Ready => {}
        other => panic!("expected ready, got {:?}", other),
    }
    assert!(h.runtime.active_host().await.is_some());
}

#[tokio::test]
async fn unknown_agent_name_is_not_found() {
    let h = harness(&["echo"]).await;

    let err = h
        .supervisor
        .call(&WorkerCommand::Start(start_params("ghost")))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert!(h.runtime.active_host().await.is_none());
}

#[tokio::test]
async fn ping_answers_pong() {
    let h = harness(&[]).await;
    let out = h.supervisor.call(&WorkerCommand::Ping).await.unwrap();
    assert_eq!(out, json!("pong"));
}

#[tokio::test]
async fn process_stats_report_positive_memory() {
    let h = harness(&[]).await;
    let out = h.supervisor.call(&WorkerCommand::GetProcessStats).await.unwrap();
    let stats: ProcessStats = serde_json::from_value(out).unwrap();
    assert!(stats.memory_bytes > 0);
}

#[tokio::test]
async fn stop_tears_the_session_down() {
    let mut h = harness(&["echo"]).await;
    h.supervisor
        .call(&WorkerCommand::Start(start_params("echo")))
        .await
        .unwrap();
    let _ = h.from_worker.recv().await; // ready

    h.supervisor.call(&WorkerCommand::Stop).await.unwrap();
    assert!(h.runtime.active_host().await.is_none());
    assert!(h.runtime.was_stopped());
}

#[tokio::test]
async fn plugin_context_changes_are_mirrored_to_the_supervisor() {
    let mut h = harness(&["echo"]).await;
    h.supervisor
        .call(&WorkerCommand::Start(start_params("echo")))
        .await
        .unwrap();
    let _ = h.from_worker.recv().await; // ready

    let host = h.runtime.active_host().await.unwrap();
    let plugin = host.plugin("memory").unwrap();
    plugin.set_context(json!({ "turns": 3 }));

    loop {
        match h.from_worker.recv().await.unwrap() {
            SupervisorCommand::SyncContext(sync) => {
                assert_eq!(sync.plugin_name, "memory");
                assert_eq!(sync.context, json!({ "turns": 3 }));
                assert_eq!(sync.agent_id, life_core::AgentId::from_string("agent_test1"));
                assert!(sync.timestamp_ms > 0);
                break;
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}

#[tokio::test]
async fn restored_plugin_contexts_are_applied_on_restart() {
    let mut h = harness(&["echo"]).await;

    let mut params = start_params("echo");
    params.plugins_contexts =
        [("memory".to_string(), json!({ "turns": 9 }))].into_iter().collect();
    params.is_restart = true;

    h.supervisor.call(&WorkerCommand::Start(params)).await.unwrap();
    let _ = h.from_worker.recv().await; // ready

    let host = h.runtime.active_host().await.unwrap();
    assert_eq!(host.plugin("memory").unwrap().context(), json!({ "turns": 9 }));
    let _ = &h.hub;
}

#[tokio::test]
async fn double_start_is_tolerated() {
    let mut h = harness(&["echo"]).await;
    h.supervisor
        .call(&WorkerCommand::Start(start_params("echo")))
        .await
        .unwrap();
    let _ = h.from_worker.recv().await; // ready

    // A second start warns and succeeds without a second session.
    h.supervisor
        .call(&WorkerCommand::Start(start_params("echo")))
        .await
        .unwrap();
}
