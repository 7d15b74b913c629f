// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! life-ipc: the parent-child control protocol.
//!
//! The supervisor and each worker talk over the child's stdio pipes using
//! length-prefixed JSON frames. Both sides issue correlated requests and
//! answer the peer's requests concurrently ([`ControlChannel`]). The channel
//! itself applies no timeouts; deadlines belong to call sites.

pub mod channel;
pub mod message;
pub mod wire;

pub use channel::{ControlChannel, ControlHandler};
pub use message::{
    ContextSync, ProcessStats, SignalKind, StartParams, SupervisorCommand, TelemetrySignal,
    WorkerCommand,
};
pub use wire::{read_frame, write_frame, WireError, MAX_FRAME_SIZE};
