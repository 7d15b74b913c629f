// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor root: worker registry and public operations.
//!
//! Every operation except `create` and `available` authorizes the caller
//! by constant-time comparison of the presented session token against the
//! worker's own. Worker faults crossing this surface gain a hint pointing
//! at the worker's logs while keeping their code intact.

use crate::build_index::{AvailableAgent, BuildIndex};
use crate::launcher::WorkerLauncher;
use crate::process::{AgentProcess, WorkerSnapshot, WorkerStatus};
use crate::stats::{HostStats, StatsCollector};
use crate::telemetry::TelemetryHub;
use life_core::{room_name, AgentId, Clock, Fault, RoomGrant, SystemClock};
use life_transport::TokenSource;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Lifetime of a minted room token.
const ROOM_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// What the supervisor is built from.
pub struct ServerDeps {
    pub build: BuildIndex,
    pub launcher: Arc<dyn WorkerLauncher>,
    pub tokens: Arc<dyn TokenSource>,
    pub telemetry: Arc<TelemetryHub>,
}

/// Response of `agent.create`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOutput {
    pub id: AgentId,
    pub client_config: Map<String, Value>,
}

/// Response of `agent.start`.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutput {
    pub session_token: String,
    pub transport_room: RoomGrant,
}

/// Response of `ping` / `info`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub life_version: String,
    pub runtime_version: String,
    pub started_at: u64,
    #[serde(flatten)]
    pub stats: HostStats,
}

/// Response of `agent.info`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerInfo {
    pub id: AgentId,
    pub name: String,
    pub scope: Option<Value>,
    pub status: WorkerStatus,
    pub last_started_at: Option<u64>,
    pub last_seen_at: Option<u64>,
    pub restart_count: u32,
    pub cpu_percent: Option<f32>,
    pub memory_bytes: Option<u64>,
}

/// The supervisor.
pub struct LifeServer {
    build: Mutex<BuildIndex>,
    registry: Mutex<HashMap<AgentId, Arc<AgentProcess>>>,
    launcher: Arc<dyn WorkerLauncher>,
    tokens: Arc<dyn TokenSource>,
    telemetry: Arc<TelemetryHub>,
    stats: StatsCollector,
    started_at: u64,
}

impl LifeServer {
    pub fn new(deps: ServerDeps) -> Arc<Self> {
        Arc::new(Self {
            build: Mutex::new(deps.build),
            registry: Mutex::new(HashMap::new()),
            launcher: deps.launcher,
            tokens: deps.tokens,
            telemetry: deps.telemetry,
            stats: StatsCollector::new(),
            started_at: SystemClock.epoch_ms(),
        })
    }

    /// Agents the build index offers, with their scope keys.
    pub fn available(&self) -> Vec<AvailableAgent> {
        self.build.lock().available()
    }

    /// Host liveness and resource usage.
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            life_version: env!("CARGO_PKG_VERSION").to_string(),
            runtime_version: env!("LIFE_RUSTC_VERSION").to_string(),
            started_at: self.started_at,
            stats: self.stats.collect(),
        }
    }

    /// Alias of [`info`](Self::info); kept as its own operation so callers
    /// can probe liveness without caring about the payload.
    pub fn ping(&self) -> ServerInfo {
        self.info()
    }

    /// Snapshot of every registered worker.
    pub fn processes(&self) -> Vec<WorkerSnapshot> {
        let mut out: Vec<WorkerSnapshot> =
            self.registry.lock().values().map(|p| p.snapshot()).collect();
        out.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        out
    }

    /// Allocate a worker for one conversation with agent `name`.
    pub fn create(
        self: &Arc<Self>,
        id: Option<AgentId>,
        name: &str,
    ) -> Result<CreateOutput, Fault> {
        let client_config = {
            let build = self.build.lock();
            let entry = build
                .get(name)
                .ok_or_else(|| Fault::not_found(format!("unknown agent {:?}", name)).public())?;
            entry.definition.resolve_config()?.client
        };

        let id = id.unwrap_or_default();
        let process = AgentProcess::new(
            id,
            name,
            Arc::clone(&self.launcher),
            Arc::clone(&self.telemetry),
        );
        self.registry.lock().insert(id, process);
        info!(id = %id, name, "worker created");
        Ok(CreateOutput { id, client_config })
    }

    /// Start a worker's session.
    ///
    /// The caller's `request` is checked against the agent's access rule
    /// with the supplied `scope`; the scope must satisfy the agent's
    /// scope schema.
    pub async fn start(
        &self,
        id: &AgentId,
        request: &Value,
        scope: Value,
    ) -> Result<StartOutput, Fault> {
        let process = self.lookup(id)?;
        let definition = {
            let build = self.build.lock();
            let entry = build.get(process.name()).ok_or_else(|| {
                Fault::not_found(format!("agent {:?} vanished from the build index", process.name()))
            })?;
            entry.definition.clone()
        };

        definition.scope.schema.validate(&scope)?;
        if !definition.scope.has_access(request, &scope) {
            return Err(Fault::forbidden("request does not grant access to this scope").public());
        }

        let room = room_name(id);
        let agent_grant = self
            .tokens
            .mint(&room, &format!("agent:{}", id), ROOM_TOKEN_TTL)
            .await?;
        let user_grant = self
            .tokens
            .mint(&room, &format!("user:{}", id), ROOM_TOKEN_TTL)
            .await?;

        process
            .start(scope, agent_grant)
            .await
            .map_err(|fault| fault.hinted(process.name(), id.as_str()))?;

        Ok(StartOutput {
            session_token: process.session_token().expose().to_string(),
            transport_room: user_grant,
        })
    }

    /// Stop a worker and drop it from the registry.
    pub async fn stop(&self, id: &AgentId, session_token: &str) -> Result<(), Fault> {
        let process = self.authorized(id, session_token)?;
        process
            .stop()
            .await
            .map_err(|fault| fault.hinted(process.name(), id.as_str()))?;
        self.registry.lock().remove(id);
        info!(id = %id, "worker stopped and removed");
        Ok(())
    }

    /// Restart a worker in place.
    pub async fn restart(&self, id: &AgentId, session_token: &str) -> Result<(), Fault> {
        let process = self.authorized(id, session_token)?;
        process
            .restart()
            .await
            .map_err(|fault| fault.hinted(process.name(), id.as_str()))
    }

    /// `"pong"` iff the worker is running.
    pub fn agent_ping(&self, id: &AgentId, session_token: &str) -> Result<&'static str, Fault> {
        let process = self.authorized(id, session_token)?;
        if process.status() == WorkerStatus::Running {
            Ok("pong")
        } else {
            Err(Fault::conflict(format!("worker is {}", process.status())).public())
        }
    }

    /// Full status of one worker, child resource usage included.
    pub async fn agent_info(&self, id: &AgentId, session_token: &str) -> Result<WorkerInfo, Fault> {
        let process = self.authorized(id, session_token)?;
        let stats = process.process_stats().await;
        Ok(WorkerInfo {
            id: *id,
            name: process.name().to_string(),
            scope: process.last_scope(),
            status: process.status(),
            last_started_at: process.last_started_at(),
            last_seen_at: process.last_seen_at(),
            restart_count: process.restart_count(),
            cpu_percent: stats.map(|s| s.cpu_percent),
            memory_bytes: stats.map(|s| s.memory_bytes),
        })
    }

    /// Hot-reload entry point: the signal file for `name` changed.
    ///
    /// Reloads the definition and restarts every running worker of that
    /// name, in parallel. An unchanged content hash does nothing.
    pub async fn definition_changed(&self, name: &str) -> Result<usize, Fault> {
        let changed = self.build.lock().reload(name)?;
        if !changed {
            return Ok(0);
        }

        let targets: Vec<Arc<AgentProcess>> = self
            .registry
            .lock()
            .values()
            .filter(|p| p.name() == name && p.status() == WorkerStatus::Running)
            .cloned()
            .collect();

        info!(name, workers = targets.len(), "definition changed; restarting workers");
        let restarts = targets.iter().map(|process| {
            let process = Arc::clone(process);
            async move {
                if let Err(fault) = process.restart().await {
                    warn!(id = %process.id(), error = %fault, "hot-reload restart failed");
                }
            }
        });
        futures_util::future::join_all(restarts).await;
        Ok(targets.len())
    }

    /// Stop every worker (shutdown path), in parallel.
    pub async fn stop_all(&self) {
        let processes: Vec<Arc<AgentProcess>> =
            self.registry.lock().values().cloned().collect();
        let stops = processes.iter().map(|process| {
            let process = Arc::clone(process);
            async move {
                if let Err(fault) = process.stop().await {
                    warn!(id = %process.id(), error = %fault, "shutdown stop failed");
                }
            }
        });
        futures_util::future::join_all(stops).await;
        self.registry.lock().clear();
        self.telemetry.flush();
    }

    /// Build directory currently served.
    pub fn build_dir(&self) -> std::path::PathBuf {
        self.build.lock().dir().to_path_buf()
    }

    /// Stored signal hash for `name` (hot-reload bookkeeping).
    pub fn signal_sha(&self, name: &str) -> Option<String> {
        self.build.lock().sha(name).map(str::to_string)
    }

    fn lookup(&self, id: &AgentId) -> Result<Arc<AgentProcess>, Fault> {
        self.registry
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Fault::not_found(format!("unknown worker {}", id)).public())
    }

    /// Token check in constant time; failures are indistinguishable from
    /// the caller's side regardless of how close the guess was.
    fn authorized(&self, id: &AgentId, session_token: &str) -> Result<Arc<AgentProcess>, Fault> {
        let process = self.lookup(id)?;
        if !process.verify_token(session_token) {
            return Err(Fault::forbidden("session token mismatch").public());
        }
        Ok(process)
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
