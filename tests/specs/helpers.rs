// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The end-to-end rig: a real supervisor driving real worker runtimes
//! in-process, joined through one in-memory transport hub.

use async_trait::async_trait;
use life_core::{AgentId, Fault, RoomGrant};
use life_ipc::ControlChannel;
use life_provider::llm::UpstreamDelta;
use life_provider::{LlmChain, LlmProvider, ScriptedLlm, ScriptedStt, SttProvider};
use life_server::{
    LaunchCtx, LaunchedWorker, LifeServer, LogExporter, ServerDeps, TelemetryHub, WorkerLauncher,
};
use life_transport::{LocalHub, LocalSession, TokenSource, TransportSession};
use life_worker::{ProviderOverrides, TransportConnector, WorkerDeps, WorkerRuntime};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Stamps room and identity into tokens so specs can tell grants apart.
pub struct StampTokens;

#[async_trait]
impl TokenSource for StampTokens {
    async fn mint(&self, room: &str, identity: &str, _ttl: Duration) -> Result<RoomGrant, Fault> {
        Ok(RoomGrant { name: room.to_string(), token: format!("tok-{}", identity) })
    }
}

struct HubConnector {
    hub: Arc<LocalHub>,
}

#[async_trait]
impl TransportConnector for HubConnector {
    async fn connect(&self) -> Result<Arc<dyn TransportSession>, Fault> {
        Ok(Arc::new(self.hub.session("agent")))
    }
}

/// A worker running the real [`WorkerRuntime`] over an in-memory pipe.
pub struct InProcWorker {
    channel: Arc<ControlChannel>,
    pub runtime: Arc<WorkerRuntime>,
    exited: CancellationToken,
    worker_channel: Arc<ControlChannel>,
}

impl InProcWorker {
    /// Simulate a hard crash: both channel ends hang up.
    pub fn crash(&self) {
        self.worker_channel.close();
        self.channel.close();
        self.exited.cancel();
    }
}

impl LaunchedWorker for InProcWorker {
    fn channel(&self) -> Arc<ControlChannel> {
        Arc::clone(&self.channel)
    }

    fn exited(&self) -> CancellationToken {
        self.exited.clone()
    }

    fn force_kill(&self) {
        self.crash();
    }
}

/// Launches real worker runtimes in-process.
pub struct InProcLauncher {
    hub: Arc<LocalHub>,
    build_dir: std::path::PathBuf,
    providers: Box<dyn Fn() -> ProviderOverrides + Send + Sync>,
    workers: Mutex<Vec<Arc<InProcWorker>>>,
}

impl InProcLauncher {
    pub fn latest(&self) -> Option<Arc<InProcWorker>> {
        self.workers.lock().last().cloned()
    }

    pub fn launch_count(&self) -> usize {
        self.workers.lock().len()
    }
}

#[async_trait]
impl WorkerLauncher for InProcLauncher {
    async fn launch(&self, ctx: LaunchCtx) -> Result<Arc<dyn LaunchedWorker>, Fault> {
        let runtime = WorkerRuntime::new(WorkerDeps {
            build_dir: self.build_dir.clone(),
            connector: Arc::new(HubConnector { hub: Arc::clone(&self.hub) }),
            providers: Some((self.providers)()),
        });

        let (parent_io, worker_io) = tokio::io::duplex(256 * 1024);
        let (parent_read, parent_write) = tokio::io::split(parent_io);
        let (worker_read, worker_write) = tokio::io::split(worker_io);

        let worker_channel =
            Arc::new(ControlChannel::spawn(worker_read, worker_write, runtime.handler()));
        runtime.attach_supervisor(Arc::clone(&worker_channel));

        let channel = Arc::new(ControlChannel::spawn(parent_read, parent_write, ctx.handler));

        let exited = CancellationToken::new();
        let hangup = exited.clone();
        let watched = Arc::clone(&channel);
        tokio::spawn(async move {
            watched.closed().await;
            hangup.cancel();
        });

        let worker = Arc::new(InProcWorker { channel, runtime, exited, worker_channel });
        self.workers.lock().push(Arc::clone(&worker));
        Ok(worker)
    }
}

/// Everything a spec needs.
pub struct Rig {
    pub server: Arc<LifeServer>,
    pub launcher: Arc<InProcLauncher>,
    pub hub: Arc<LocalHub>,
    _dir: tempfile::TempDir,
}

impl Rig {
    pub fn build_dir(&self) -> &std::path::Path {
        self._dir.path()
    }

    /// A user-side session joined to a worker's room.
    pub async fn join_as_user(&self, id: &AgentId, room: &RoomGrant) -> Arc<LocalSession> {
        let session = Arc::new(self.hub.session(format!("user:{}", id)));
        session.join_room(&room.name, &room.token).await.expect("user join failed");
        session
    }
}

/// Write one agent definition into the build dir.
pub fn write_definition(dir: &std::path::Path, name: &str, greeting: &str) {
    let definition = json!({
        "name": name,
        "scope": {
            "schema": {
                "type": "object",
                "properties": { "user_id": { "type": "string" } },
            },
            "access": { "kind": "open" },
        },
        "plugins": [{ "name": "memory" }],
        "source": format!("/app/agents/{}/agent.ts", name),
        "config": {
            "path": format!("/app/agents/{}/config.json", name),
            "values": { "greeting": greeting, "api_key": "sk-secret" },
        },
    });
    std::fs::write(
        dir.join(format!("{}.json", name)),
        serde_json::to_vec_pretty(&definition).unwrap(),
    )
    .unwrap();
}

/// Scripted providers: STT answers every frame with `heard`, the LLM
/// replies with `reply`.
pub fn scripted_providers(heard: &str, reply: &str) -> ProviderOverrides {
    let heard = heard.to_string();
    let reply = reply.to_string();
    ProviderOverrides {
        llm: Some(Arc::new(LlmChain::new(
            LlmProvider::Scripted(ScriptedLlm::new(vec![
                UpstreamDelta::Text(reply),
                UpstreamDelta::Finish(life_provider::llm::FinishSignal::Stop),
            ])),
            vec![],
        ))),
        stt: Some(Arc::new(SttProvider::Scripted(ScriptedStt::new(vec![heard; 8])))),
    }
}

/// Build a rig over the given agents.
pub fn rig_with(agents: &[&str], providers: ProviderOverrides) -> Rig {
    let dir = tempfile::tempdir().unwrap();
    for agent in agents {
        write_definition(dir.path(), agent, "hi");
    }
    // Overrides are per-launch; keep the scripts cloneable by rebuilding.
    let providers = Mutex::new(Some(providers));
    rig_with_factory(dir, agents, move || providers.lock().take().unwrap_or_default())
}

/// Build a rig with a provider factory invoked per worker launch.
pub fn rig_with_factory(
    dir: tempfile::TempDir,
    _agents: &[&str],
    providers: impl Fn() -> ProviderOverrides + Send + Sync + 'static,
) -> Rig {
    let hub = LocalHub::new();
    let launcher = Arc::new(InProcLauncher {
        hub: Arc::clone(&hub),
        build_dir: dir.path().to_path_buf(),
        providers: Box::new(providers),
        workers: Mutex::new(Vec::new()),
    });
    let server = LifeServer::new(ServerDeps {
        build: life_server::BuildIndex::load(dir.path()).unwrap(),
        launcher: Arc::clone(&launcher) as Arc<dyn WorkerLauncher>,
        tokens: Arc::new(StampTokens),
        telemetry: TelemetryHub::new(Arc::new(LogExporter)),
    });
    Rig { server, launcher, hub, _dir: dir }
}

/// Plain rig: agents without providers.
pub fn rig(agents: &[&str]) -> Rig {
    let dir = tempfile::tempdir().unwrap();
    for agent in agents {
        write_definition(dir.path(), agent, "hi");
    }
    rig_with_factory(dir, agents, ProviderOverrides::default)
}
