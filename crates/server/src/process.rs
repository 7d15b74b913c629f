// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker lifecycle state machine.
//!
//! Transitions are exactly stopped → starting → running → stopping →
//! stopped, with the failure shortcut starting → stopped. A `lifecycle`
//! mutex serializes start/stop/restart so a start can never interleave
//! with itself; background tasks (health loop, exit watch, restart timer)
//! are generation-guarded by an epoch counter so a stopped worker's tasks
//! can never touch its successor.

use crate::launcher::{LaunchCtx, LaunchedWorker, WorkerLauncher};
use crate::telemetry::TelemetryHub;
use life_core::{
    AgentId, Clock, Fault, RoomGrant, SessionToken, SystemClock, ENV_TELEMETRY_DISABLED,
};
use life_ipc::{ControlHandler, ProcessStats, StartParams, SupervisorCommand, WorkerCommand};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Health ping period.
pub const HEALTH_INTERVAL: Duration = Duration::from_secs(10);

/// Deadline for one health ping.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// Budget for a graceful child stop before force-kill.
pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Crashes after this many restarts are no longer recovered automatically.
pub const MAX_AUTO_RESTARTS: u32 = 3;

/// Backoff ceiling for auto-restarts.
pub const RESTART_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Delay before auto-restart number `restart_count + 1`.
///
/// The sequence is 0, 2 s, 4 s, 8 s, 16 s, 30 s, 30 s, … (capped).
pub fn restart_delay(restart_count: u32) -> Duration {
    if restart_count == 0 {
        return Duration::ZERO;
    }
    let millis = 1000u64
        .saturating_mul(2u64.saturating_pow(restart_count))
        .min(RESTART_BACKOFF_CAP.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Lifecycle status of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Registry row returned by `processes()`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub id: AgentId,
    pub name: String,
    pub status: WorkerStatus,
    pub last_started_at: Option<u64>,
}

struct ProcState {
    status: WorkerStatus,
    last_scope: Option<Value>,
    last_room: Option<RoomGrant>,
    last_started_at: Option<u64>,
    last_seen_at: Option<u64>,
    restart_count: u32,
    /// Source of truth replayed into the next start (crash recovery).
    plugin_contexts: BTreeMap<String, Value>,
    child: Option<Arc<dyn LaunchedWorker>>,
    restart_timer: Option<JoinHandle<()>>,
    health_task: Option<JoinHandle<()>>,
    ready_tx: Option<oneshot::Sender<()>>,
    /// Generation counter; bumped on every ownership change so stale
    /// background tasks detach themselves.
    epoch: u64,
}

/// One worker's supervisor-side record and state machine.
pub struct AgentProcess {
    id: AgentId,
    name: String,
    session_token: SessionToken,
    launcher: Arc<dyn WorkerLauncher>,
    telemetry: Arc<TelemetryHub>,
    state: Mutex<ProcState>,
    /// Serializes start/stop/restart.
    lifecycle: tokio::sync::Mutex<()>,
}

impl AgentProcess {
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        launcher: Arc<dyn WorkerLauncher>,
        telemetry: Arc<TelemetryHub>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: name.into(),
            session_token: SessionToken::mint(),
            launcher,
            telemetry,
            state: Mutex::new(ProcState {
                status: WorkerStatus::Stopped,
                last_scope: None,
                last_room: None,
                last_started_at: None,
                last_seen_at: None,
                restart_count: 0,
                plugin_contexts: BTreeMap::new(),
                child: None,
                restart_timer: None,
                health_task: None,
                ready_tx: None,
                epoch: 0,
            }),
            lifecycle: tokio::sync::Mutex::new(()),
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constant-time session-token check.
    pub fn verify_token(&self, presented: &str) -> bool {
        self.session_token.verify(presented)
    }

    pub fn session_token(&self) -> &SessionToken {
        &self.session_token
    }

    pub fn status(&self) -> WorkerStatus {
        self.state.lock().status
    }

    pub fn restart_count(&self) -> u32 {
        self.state.lock().restart_count
    }

    pub fn last_seen_at(&self) -> Option<u64> {
        self.state.lock().last_seen_at
    }

    pub fn last_started_at(&self) -> Option<u64> {
        self.state.lock().last_started_at
    }

    pub fn last_scope(&self) -> Option<Value> {
        self.state.lock().last_scope.clone()
    }

    pub fn plugin_contexts(&self) -> BTreeMap<String, Value> {
        self.state.lock().plugin_contexts.clone()
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        let st = self.state.lock();
        WorkerSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: st.status,
            last_started_at: st.last_started_at,
        }
    }

    /// Start the worker.
    ///
    /// Idempotent while starting or running; `Conflict` while stopping.
    /// Any failure rolls back through the stop path and returns the
    /// original error.
    pub async fn start(self: &Arc<Self>, scope: Value, room: RoomGrant) -> Result<(), Fault> {
        let _guard = self.lifecycle.lock().await;
        self.start_locked(scope, room, false).await
    }

    /// Stop the worker: graceful child stop with a 10 s budget, then
    /// force-kill. Idempotent from stopped/stopping.
    pub async fn stop(&self) -> Result<(), Fault> {
        let _guard = self.lifecycle.lock().await;
        self.stop_locked().await
    }

    /// Stop, then start with the last known scope and room.
    ///
    /// `Conflict` if the worker was never started. Increments
    /// `restart_count` before starting (it never resets to zero).
    pub async fn restart(self: &Arc<Self>) -> Result<(), Fault> {
        let _guard = self.lifecycle.lock().await;
        let (scope, room) = self.last_session()?;
        self.state.lock().restart_count += 1;
        self.stop_locked().await?;
        self.start_locked(scope, room, true).await
    }

    /// cpu/memory of the child, when one is running.
    pub async fn process_stats(&self) -> Option<ProcessStats> {
        let channel = {
            let st = self.state.lock();
            if st.status != WorkerStatus::Running {
                return None;
            }
            st.child.as_ref().map(|c| c.channel())
        }?;
        let value = tokio::time::timeout(
            HEALTH_TIMEOUT,
            channel.call(&WorkerCommand::GetProcessStats),
        )
        .await
        .ok()?
        .ok()?;
        serde_json::from_value(value).ok()
    }

    fn last_session(&self) -> Result<(Value, RoomGrant), Fault> {
        let st = self.state.lock();
        match (st.last_scope.clone(), st.last_room.clone()) {
            (Some(scope), Some(room)) => Ok((scope, room)),
            _ => Err(Fault::conflict("worker was never started").public()),
        }
    }

    async fn start_locked(
        self: &Arc<Self>,
        scope: Value,
        room: RoomGrant,
        is_restart: bool,
    ) -> Result<(), Fault> {
        {
            let mut st = self.state.lock();
            match st.status {
                WorkerStatus::Starting | WorkerStatus::Running => {
                    warn!(id = %self.id, status = %st.status, "start requested twice");
                    return Ok(());
                }
                WorkerStatus::Stopping => {
                    return Err(Fault::conflict("worker is stopping").public());
                }
                WorkerStatus::Stopped => {}
            }
            st.status = WorkerStatus::Starting;
            st.epoch += 1;
            st.last_scope = Some(scope.clone());
            st.last_room = Some(room.clone());
        }

        match self.spawn_worker(scope, room, is_restart).await {
            Ok(()) => Ok(()),
            Err(fault) => {
                // Roll back through the normal stop path; the caller gets
                // the original error, not the cleanup's.
                if let Err(stop_fault) = self.stop_locked().await {
                    debug!(id = %self.id, error = %stop_fault, "rollback stop failed");
                }
                Err(fault)
            }
        }
    }

    async fn spawn_worker(
        self: &Arc<Self>,
        scope: Value,
        room: RoomGrant,
        is_restart: bool,
    ) -> Result<(), Fault> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (epoch, plugins_contexts) = {
            let mut st = self.state.lock();
            st.ready_tx = Some(ready_tx);
            (st.epoch, st.plugin_contexts.clone())
        };

        let worker = self
            .launcher
            .launch(LaunchCtx {
                agent_id: self.id,
                agent_name: self.name.clone(),
                handler: self.control_handler(),
                env: vec![(ENV_TELEMETRY_DISABLED.to_string(), "1".to_string())],
            })
            .await?;
        self.state.lock().child = Some(Arc::clone(&worker));

        let params = StartParams {
            id: self.id,
            name: self.name.clone(),
            scope,
            transport_room: room,
            plugins_contexts,
            is_restart,
        };
        worker.channel().call(&WorkerCommand::Start(params)).await?;

        // The child confirms with its own ready() request.
        let exited = worker.exited();
        tokio::select! {
            ready = ready_rx => {
                ready.map_err(|_| Fault::unknown("worker dropped before ready"))?;
            }
            _ = exited.cancelled() => {
                return Err(Fault::unknown("worker exited during startup"));
            }
        }

        {
            let mut st = self.state.lock();
            st.status = WorkerStatus::Running;
            let now = SystemClock.epoch_ms();
            st.last_started_at = Some(now);
            st.last_seen_at = Some(now);
        }
        self.spawn_exit_watch(epoch, worker.exited());
        self.spawn_health(epoch, worker);
        info!(id = %self.id, name = %self.name, "worker running");
        Ok(())
    }

    async fn stop_locked(&self) -> Result<(), Fault> {
        let child = {
            let mut st = self.state.lock();
            if let Some(timer) = st.restart_timer.take() {
                timer.abort();
            }
            st.epoch += 1;
            if matches!(st.status, WorkerStatus::Stopped | WorkerStatus::Stopping) {
                return Ok(());
            }
            st.status = WorkerStatus::Stopping;
            if let Some(task) = st.health_task.take() {
                task.abort();
            }
            st.ready_tx = None;
            st.child.take()
        };

        if let Some(child) = child {
            let channel = child.channel();
            match tokio::time::timeout(
                GRACEFUL_STOP_TIMEOUT,
                channel.call(&WorkerCommand::Stop),
            )
            .await
            {
                Ok(Ok(_)) => debug!(id = %self.id, "worker stopped gracefully"),
                Ok(Err(fault)) => {
                    warn!(id = %self.id, error = %fault, "graceful stop failed; force-killing");
                    child.force_kill();
                }
                Err(_) => {
                    warn!(id = %self.id, "graceful stop timed out; force-killing");
                    child.force_kill();
                }
            }
            channel.close();
        }

        let mut st = self.state.lock();
        st.status = WorkerStatus::Stopped;
        st.last_started_at = None;
        st.last_seen_at = None;
        Ok(())
    }

    /// Handler for the child's supervisor-bound requests.
    fn control_handler(self: &Arc<Self>) -> ControlHandler {
        let weak = Arc::downgrade(self);
        Arc::new(move |body: Value| {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(proc) = weak.upgrade() else {
                    return Err(Fault::unknown("worker record dropped"));
                };
                let command: SupervisorCommand = serde_json::from_value(body)
                    .map_err(|e| Fault::validation("malformed supervisor command").with_cause(e))?;
                match command {
                    SupervisorCommand::Ready => {
                        if let Some(tx) = proc.state.lock().ready_tx.take() {
                            let _ = tx.send(());
                        }
                        Ok(json!(null))
                    }
                    SupervisorCommand::SyncContext(sync) => {
                        debug!(id = %proc.id, plugin = %sync.plugin_name, "context sync");
                        proc.state
                            .lock()
                            .plugin_contexts
                            .insert(sync.plugin_name, sync.context);
                        Ok(json!(null))
                    }
                    SupervisorCommand::SyncTelemetry(signal) => {
                        proc.telemetry.ingest(signal);
                        Ok(json!(null))
                    }
                }
            })
        })
    }

    /// Watch for the child dying out from under us.
    ///
    /// Installed once the worker is Running. A child that dies during the
    /// ready handshake fails the start() call instead; unattended restart
    /// attempts chain their own retries (see `auto_restart`).
    fn spawn_exit_watch(self: &Arc<Self>, epoch: u64, exited: tokio_util::sync::CancellationToken) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            exited.cancelled().await;
            if let Some(proc) = weak.upgrade() {
                proc.handle_exit(epoch);
            }
        });
    }

    fn handle_exit(self: &Arc<Self>, epoch: u64) {
        {
            let mut st = self.state.lock();
            if st.epoch != epoch {
                // A stop or restart already owns this child.
                return;
            }
            if !matches!(st.status, WorkerStatus::Running | WorkerStatus::Starting) {
                return;
            }
            warn!(id = %self.id, name = %self.name, "worker crashed");
            st.status = WorkerStatus::Stopped;
            st.child = None;
            st.last_started_at = None;
            st.last_seen_at = None;
            st.ready_tx = None;
            st.epoch += 1;
            if let Some(task) = st.health_task.take() {
                task.abort();
            }
        }
        self.schedule_auto_restart();
    }

    fn schedule_auto_restart(self: &Arc<Self>) {
        let delay = {
            let st = self.state.lock();
            if st.restart_count >= MAX_AUTO_RESTARTS {
                error!(
                    id = %self.id,
                    name = %self.name,
                    restarts = st.restart_count,
                    "restart budget exhausted; not restarting"
                );
                return;
            }
            restart_delay(st.restart_count)
        };

        if delay.is_zero() {
            warn!(id = %self.id, name = %self.name, "Restarting immediately.");
        } else {
            warn!(
                id = %self.id,
                name = %self.name,
                "Restarting in {}ms.",
                delay.as_millis()
            );
        }

        let proc = Arc::clone(self);
        let timer = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            proc.auto_restart().await;
        });
        self.state.lock().restart_timer = Some(timer);
    }

    async fn auto_restart(self: Arc<Self>) {
        let _guard = self.lifecycle.lock().await;
        let Ok((scope, room)) = self.last_session() else {
            return;
        };
        {
            let mut st = self.state.lock();
            if st.status != WorkerStatus::Stopped {
                // A manual start won the race; nothing to recover.
                return;
            }
            st.restart_count += 1;
        }
        if let Err(fault) = self.start_locked(scope, room, true).await {
            error!(id = %self.id, name = %self.name, error = %fault, "auto-restart failed");
            // Chain the next attempt while the budget lasts.
            self.schedule_auto_restart();
        }
    }

    fn spawn_health(self: &Arc<Self>, epoch: u64, worker: Arc<dyn LaunchedWorker>) {
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // the immediate first tick

            loop {
                ticker.tick().await;
                let Some(proc) = weak.upgrade() else { return };
                if proc.state.lock().epoch != epoch {
                    return;
                }
                let ping = tokio::time::timeout(
                    HEALTH_TIMEOUT,
                    worker.channel().call(&WorkerCommand::Ping),
                )
                .await;
                match ping {
                    Ok(Ok(_)) => {
                        proc.state.lock().last_seen_at = Some(SystemClock.epoch_ms());
                    }
                    Ok(Err(fault)) => {
                        warn!(id = %proc.id, error = %fault, "health ping failed; force-killing");
                        worker.force_kill();
                        return;
                    }
                    Err(_) => {
                        warn!(id = %proc.id, "health ping timed out; force-killing");
                        worker.force_kill();
                        return;
                    }
                }
            }
        });
        self.state.lock().health_task = Some(task);
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
