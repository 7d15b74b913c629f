// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! life-worker: the per-conversation agent process.
//!
//! One worker hosts one agent instance for one session. It is spawned by
//! the supervisor, speaks the control protocol over its stdio pipes, joins
//! the session's realtime room, and wires transport, framer, RPC, and
//! providers into the agent pipeline.

pub mod agent;
pub mod index;
pub mod plugins;
pub mod providers;
pub mod runtime;
pub mod telemetry;

pub use agent::{AgentHost, TransportConnector};
pub use runtime::{
    ProviderOverrides, WorkerDeps, WorkerRuntime, ENV_BUILD_DIR, ENV_TELEMETRY_DISABLED,
};
pub use telemetry::TelemetryQueue;
