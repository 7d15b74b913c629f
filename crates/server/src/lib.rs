// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! life-server: the supervisor.
//!
//! `lifed` hosts many isolated per-conversation worker processes. It loads
//! the compiler's build index, mints transport tokens, runs the per-worker
//! lifecycle state machine (spawn, ready handshake, health pings, bounded
//! crash-restart, graceful stop), hot-reloads agents when their signal
//! files change, and demultiplexes telemetry coming back from workers.

pub mod build_index;
pub mod env;
pub mod launcher;
pub mod process;
pub mod reload;
pub mod server;
pub mod stats;
pub mod telemetry;

pub use build_index::{AvailableAgent, BuildIndex};
pub use launcher::{LaunchCtx, LaunchedWorker, ProcessLauncher, WorkerLauncher};
pub use process::{AgentProcess, WorkerStatus};
pub use reload::ReloadWatcher;
pub use server::{LifeServer, ServerDeps};
pub use telemetry::{LogExporter, TelemetryExporter, TelemetryHub};

#[cfg(any(test, feature = "test-support"))]
pub use launcher::scripted::{ScriptedBehavior, ScriptedLauncher, ScriptedWorker};
