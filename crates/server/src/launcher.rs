// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker launching.
//!
//! [`WorkerLauncher`] abstracts how a worker comes to exist so the
//! lifecycle state machine can be exercised without real processes.
//! [`ProcessLauncher`] spawns the `life-worker` binary with the control
//! protocol on its stdio pipes; the scripted launcher (test-support) runs
//! an in-memory peer with configurable failure behavior.

use async_trait::async_trait;
use life_core::{AgentId, Fault};
use life_ipc::{ControlChannel, ControlHandler};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Env var pointing at the worker binary (falls back to a sibling of the
/// supervisor executable).
pub const ENV_WORKER_BINARY: &str = "LIFE_WORKER_BINARY";

/// What the supervisor hands a launcher.
pub struct LaunchCtx {
    pub agent_id: AgentId,
    pub agent_name: String,
    /// Handler for the child's supervisor-bound requests
    /// (ready / sync_context / sync_telemetry).
    pub handler: ControlHandler,
    /// Environment injected into the child, on top of the parent's own.
    pub env: Vec<(String, String)>,
}

/// A live worker, however it was launched.
pub trait LaunchedWorker: Send + Sync + 'static {
    fn channel(&self) -> Arc<ControlChannel>;

    /// Cancelled once the worker is gone (process exit or peer hangup).
    fn exited(&self) -> CancellationToken;

    /// SIGKILL-equivalent. Must be safe to call repeatedly.
    fn force_kill(&self);
}

#[async_trait]
pub trait WorkerLauncher: Send + Sync + 'static {
    async fn launch(&self, ctx: LaunchCtx) -> Result<Arc<dyn LaunchedWorker>, Fault>;
}

/// Spawns real `life-worker` processes.
pub struct ProcessLauncher {
    binary: PathBuf,
}

impl ProcessLauncher {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Resolve the worker binary: env override, else next to our own
    /// executable.
    pub fn from_env() -> Result<Self, Fault> {
        if let Ok(path) = std::env::var(ENV_WORKER_BINARY) {
            return Ok(Self::new(path.into()));
        }
        let exe = std::env::current_exe()
            .map_err(|e| Fault::unknown("cannot resolve own executable").with_cause(e))?;
        let sibling = exe.with_file_name("life-worker");
        Ok(Self::new(sibling))
    }
}

struct ProcessWorker {
    channel: Arc<ControlChannel>,
    exited: CancellationToken,
    kill: tokio::sync::mpsc::UnboundedSender<()>,
}

impl LaunchedWorker for ProcessWorker {
    fn channel(&self) -> Arc<ControlChannel> {
        Arc::clone(&self.channel)
    }

    fn exited(&self) -> CancellationToken {
        self.exited.clone()
    }

    fn force_kill(&self) {
        let _ = self.kill.send(());
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, ctx: LaunchCtx) -> Result<Arc<dyn LaunchedWorker>, Fault> {
        let mut command = tokio::process::Command::new(&self.binary);
        command
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);
        // Children inherit our environment plus the per-worker variables.
        for (key, value) in &ctx.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| {
            Fault::unknown(format!("cannot spawn worker binary {}", self.binary.display()))
                .with_cause(e)
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Fault::unknown("worker child has no stdin pipe"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Fault::unknown("worker child has no stdout pipe"))?;

        let channel = Arc::new(ControlChannel::spawn(stdout, stdin, ctx.handler));
        let exited = CancellationToken::new();
        let (kill_tx, mut kill_rx) = tokio::sync::mpsc::unbounded_channel::<()>();

        // Reaper: owns the child, forwards force-kills, flags the exit.
        let reaper_exited = exited.clone();
        let agent_id = ctx.agent_id;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    status = child.wait() => {
                        match status {
                            Ok(status) => {
                                debug!(id = %agent_id, code = ?status.code(), "worker exited")
                            }
                            Err(e) => warn!(id = %agent_id, error = %e, "worker wait failed"),
                        }
                        break;
                    }
                    _ = kill_rx.recv() => {
                        if let Err(e) = child.start_kill() {
                            warn!(id = %agent_id, error = %e, "force-kill failed");
                        }
                    }
                }
            }
            reaper_exited.cancel();
        });

        Ok(Arc::new(ProcessWorker { channel, exited, kill: kill_tx }))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod scripted {
    //! An in-memory worker with scriptable failure modes.

    use super::*;
    use life_ipc::{StartParams, SupervisorCommand, WorkerCommand};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Knobs for how scripted workers behave.
    #[derive(Default)]
    pub struct ScriptedBehavior {
        /// Fail this many launches before succeeding.
        pub failing_launches: AtomicUsize,
        /// Respond to `start` with a fault.
        pub fail_start: AtomicBool,
        /// Never answer `stop` (exercises the graceful-stop timeout).
        pub ignore_stop: AtomicBool,
        /// Never answer `ping` (exercises the health loop).
        pub ignore_ping: AtomicBool,
        /// Skip the `ready` notification after a successful start.
        pub suppress_ready: AtomicBool,
    }

    /// One scripted worker instance.
    pub struct ScriptedWorker {
        /// The supervisor-facing channel (what the launcher returns).
        channel: Arc<ControlChannel>,
        /// Our own channel end, for issuing supervisor commands.
        peer: Arc<ControlChannel>,
        exited: CancellationToken,
        starts: Mutex<Vec<StartParams>>,
    }

    impl ScriptedWorker {
        /// Every `start` the worker received, in order.
        pub fn starts(&self) -> Vec<StartParams> {
            self.starts.lock().clone()
        }

        /// Simulate a process crash: hang up and flag the exit.
        pub fn crash(&self) {
            self.peer.close();
            self.channel.close();
            self.exited.cancel();
        }

        /// Send a supervisor command as the worker would.
        pub async fn send(&self, command: &SupervisorCommand) -> Result<Value, Fault> {
            self.peer.call(command).await
        }
    }

    impl LaunchedWorker for ScriptedWorker {
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

    /// Launches scripted workers and keeps handles for the test to poke.
    #[derive(Default)]
    pub struct ScriptedLauncher {
        pub behavior: Arc<ScriptedBehavior>,
        workers: Mutex<Vec<Arc<ScriptedWorker>>>,
        launches: AtomicUsize,
    }

    impl ScriptedLauncher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn launch_count(&self) -> usize {
            self.launches.load(Ordering::Relaxed)
        }

        /// Workers launched so far, oldest first.
        pub fn workers(&self) -> Vec<Arc<ScriptedWorker>> {
            self.workers.lock().clone()
        }

        pub fn latest(&self) -> Option<Arc<ScriptedWorker>> {
            self.workers.lock().last().cloned()
        }
    }

    #[async_trait]
    impl WorkerLauncher for ScriptedLauncher {
        async fn launch(&self, ctx: LaunchCtx) -> Result<Arc<dyn LaunchedWorker>, Fault> {
            self.launches.fetch_add(1, Ordering::Relaxed);
            let failing = self.behavior.failing_launches.load(Ordering::Relaxed);
            if failing > 0 {
                self.behavior.failing_launches.store(failing - 1, Ordering::Relaxed);
                return Err(Fault::unknown("scripted launch failure"));
            }

            let (parent_io, worker_io) = tokio::io::duplex(256 * 1024);
            let (parent_read, parent_write) = tokio::io::split(parent_io);
            let (worker_read, worker_write) = tokio::io::split(worker_io);

            let exited = CancellationToken::new();
            let starts = Mutex::new(Vec::new());

            let worker = Arc::new_cyclic(|weak: &std::sync::Weak<ScriptedWorker>| {
                let behavior = Arc::clone(&self.behavior);
                let weak = weak.clone();
                let handler: ControlHandler = Arc::new(move |body: Value| {
                    let behavior = Arc::clone(&behavior);
                    let weak = weak.clone();
                    Box::pin(async move {
                        let command: WorkerCommand = serde_json::from_value(body)
                            .map_err(|e| Fault::validation("bad command").with_cause(e))?;
                        match command {
                            WorkerCommand::Start(params) => {
                                if behavior.fail_start.load(Ordering::Relaxed) {
                                    return Err(Fault::validation("scripted start failure"));
                                }
                                if let Some(worker) = weak.upgrade() {
                                    worker.starts.lock().push(params);
                                    if !behavior.suppress_ready.load(Ordering::Relaxed) {
                                        tokio::spawn(async move {
                                            let _ =
                                                worker.send(&SupervisorCommand::Ready).await;
                                        });
                                    }
                                }
                                Ok(json!(null))
                            }
                            WorkerCommand::Stop => {
                                if behavior.ignore_stop.load(Ordering::Relaxed) {
                                    std::future::pending::<()>().await;
                                }
                                Ok(json!(null))
                            }
                            WorkerCommand::Ping => {
                                if behavior.ignore_ping.load(Ordering::Relaxed) {
                                    std::future::pending::<()>().await;
                                }
                                Ok(json!("pong"))
                            }
                            WorkerCommand::GetProcessStats => Ok(json!({
                                "cpu_percent": 1.5,
                                "memory_bytes": 42 * 1024 * 1024,
                            })),
                        }
                    })
                });

                ScriptedWorker {
                    channel: Arc::new(ControlChannel::spawn(
                        parent_read,
                        parent_write,
                        ctx.handler,
                    )),
                    peer: Arc::new(ControlChannel::spawn(worker_read, worker_write, handler)),
                    exited,
                    starts,
                }
            });

            self.workers.lock().push(Arc::clone(&worker));
            Ok(worker)
        }
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
