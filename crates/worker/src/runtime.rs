// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker's control-command surface and start sequence.

use crate::agent::{AgentHost, TransportConnector};
use crate::telemetry::TelemetryQueue;
use crate::{index, providers};
use life_core::{Clock, Fault, SystemClock};
use life_ipc::{
    ContextSync, ControlChannel, ControlHandler, ProcessStats, StartParams, SupervisorCommand,
    WorkerCommand,
};
use life_provider::{LlmChain, SttProvider};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use life_core::{ENV_BUILD_DIR, ENV_TELEMETRY_DISABLED};

/// Provider overrides used instead of config-derived providers.
#[derive(Default)]
pub struct ProviderOverrides {
    pub llm: Option<Arc<LlmChain>>,
    pub stt: Option<Arc<SttProvider>>,
}

/// Everything a worker needs besides the control channel.
pub struct WorkerDeps {
    pub build_dir: PathBuf,
    pub connector: Arc<dyn TransportConnector>,
    /// When set, wins over providers derived from the agent config.
    pub providers: Option<ProviderOverrides>,
}

struct ActiveAgent {
    host: Arc<AgentHost>,
    context_tasks: Vec<JoinHandle<()>>,
}

/// One worker process's runtime state.
pub struct WorkerRuntime {
    deps: WorkerDeps,
    supervisor: OnceLock<Arc<ControlChannel>>,
    telemetry: OnceLock<TelemetryQueue>,
    active: tokio::sync::Mutex<Option<ActiveAgent>>,
    stopped: CancellationToken,
}

impl WorkerRuntime {
    pub fn new(deps: WorkerDeps) -> Arc<Self> {
        Arc::new(Self {
            deps,
            supervisor: OnceLock::new(),
            telemetry: OnceLock::new(),
            active: tokio::sync::Mutex::new(None),
            stopped: CancellationToken::new(),
        })
    }

    /// Wire the supervisor channel in after it is spawned.
    pub fn attach_supervisor(&self, channel: Arc<ControlChannel>) {
        let disabled = std::env::var_os(ENV_TELEMETRY_DISABLED).is_some();
        let _ = self.telemetry.set(TelemetryQueue::start(Arc::clone(&channel), disabled));
        let _ = self.supervisor.set(channel);
    }

    fn supervisor(&self) -> Result<Arc<ControlChannel>, Fault> {
        self.supervisor
            .get()
            .cloned()
            .ok_or_else(|| Fault::unknown("supervisor channel not attached"))
    }

    /// The worker-side telemetry queue.
    pub fn telemetry(&self) -> Option<&TelemetryQueue> {
        self.telemetry.get()
    }

    /// Resolves once a graceful stop was served.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await;
    }

    /// Whether a graceful stop was served.
    pub fn was_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// The control handler to install on the channel.
    pub fn handler(self: &Arc<Self>) -> ControlHandler {
        let runtime = Arc::clone(self);
        Arc::new(move |body: Value| {
            let runtime = Arc::clone(&runtime);
            Box::pin(async move {
                let command: WorkerCommand = serde_json::from_value(body)
                    .map_err(|e| Fault::validation("malformed worker command").with_cause(e))?;
                match command {
                    WorkerCommand::Start(params) => {
                        runtime.start(params).await?;
                        Ok(json!(null))
                    }
                    WorkerCommand::Stop => {
                        runtime.stop().await;
                        runtime.stopped.cancel();
                        Ok(json!(null))
                    }
                    WorkerCommand::Ping => Ok(json!("pong")),
                    WorkerCommand::GetProcessStats => {
                        let stats = self_process_stats()?;
                        serde_json::to_value(stats)
                            .map_err(|e| Fault::unknown("stats serialization").with_cause(e))
                    }
                }
            })
        })
    }

    /// Bring the agent session up. See the supervisor for the state machine;
    /// inside the worker the sequence is load → resolve → construct →
    /// subscribe → start pipeline → join → ready.
    async fn start(self: &Arc<Self>, params: StartParams) -> Result<(), Fault> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            warn!(id = %params.id, "start requested while already running");
            return Ok(());
        }

        let definition = index::load_definition(&self.deps.build_dir, &params.name)?;
        let resolved = definition.resolve_config()?;

        let (llm, stt) = match &self.deps.providers {
            Some(overrides) => (overrides.llm.clone(), overrides.stt.clone()),
            None => (
                providers::llm_chain(&resolved.server)?,
                providers::stt_provider(&resolved.server)?,
            ),
        };

        let session = self.deps.connector.connect().await?;
        let host =
            AgentHost::new(definition, session, &params.plugins_contexts, llm, stt);

        // Mirror plugin-context changes to the supervisor. Failures are
        // logged, never fatal to the agent.
        let mut context_tasks = Vec::new();
        for plugin in host.plugins() {
            if !plugin.watches_context() {
                continue;
            }
            let supervisor = self.supervisor()?;
            let mut watch = plugin.watch();
            let plugin = Arc::clone(plugin);
            let agent_id = params.id;
            context_tasks.push(tokio::spawn(async move {
                while watch.changed().await.is_ok() {
                    let sync = ContextSync {
                        agent_id,
                        plugin_name: plugin.name().to_string(),
                        context: watch.borrow_and_update().clone(),
                        timestamp_ms: SystemClock.epoch_ms(),
                    };
                    if let Err(fault) =
                        supervisor.call(&SupervisorCommand::SyncContext(sync)).await
                    {
                        error!(target: "telemetry", plugin = plugin.name(), error = %fault,
                            "context sync failed");
                    }
                }
            }));
        }

        if let Err(fault) = host.start(&params.transport_room).await {
            for task in context_tasks {
                task.abort();
            }
            return Err(fault);
        }

        info!(id = %params.id, name = %params.name, is_restart = params.is_restart,
            "agent session up");
        *active = Some(ActiveAgent { host, context_tasks });
        drop(active);

        // Tell the supervisor we are serving. Best effort: if this call
        // fails the health loop will notice soon enough.
        if let Ok(supervisor) = self.supervisor() {
            if let Err(fault) = supervisor.call(&SupervisorCommand::Ready).await {
                warn!(error = %fault, "ready notification failed");
            }
        }
        Ok(())
    }

    /// Graceful teardown. Idempotent.
    async fn stop(&self) {
        let mut active = self.active.lock().await;
        if let Some(agent) = active.take() {
            agent.host.stop().await;
            for task in agent.context_tasks {
                task.abort();
            }
        }
        if let Some(telemetry) = self.telemetry.get() {
            telemetry.flush(crate::telemetry::EXIT_FLUSH_BUDGET).await;
        }
    }

    /// Current agent host, if a session is up (used by tests and plugins).
    pub async fn active_host(&self) -> Option<Arc<AgentHost>> {
        self.active.lock().await.as_ref().map(|a| Arc::clone(&a.host))
    }
}

/// cpu/memory of this worker process.
fn self_process_stats() -> Result<ProcessStats, Fault> {
    let pid = sysinfo::get_current_pid()
        .map_err(|e| Fault::unknown("cannot resolve own pid").with_cause(e))?;
    let mut system = sysinfo::System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
    let process = system
        .process(pid)
        .ok_or_else(|| Fault::unknown("own process missing from table"))?;
    Ok(ProcessStats { cpu_percent: process.cpu_usage(), memory_bytes: process.memory() })
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
