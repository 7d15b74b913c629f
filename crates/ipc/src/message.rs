// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control protocol message shapes.
//!
//! [`WorkerCommand`] flows parent → child, [`SupervisorCommand`] child →
//! parent. Every command resolves to `Result<serde_json::Value, Fault>` on
//! the issuing side.

use life_core::{AgentId, RoomGrant};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Everything a worker needs to bring one agent session up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartParams {
    pub id: AgentId,
    pub name: String,
    /// Session scope payload, already schema-validated by the supervisor.
    pub scope: Value,
    pub transport_room: RoomGrant,
    /// Plugin snapshots accumulated by the supervisor; replayed on restart
    /// so a crashed worker resumes its plugin state.
    #[serde(default)]
    pub plugins_contexts: BTreeMap<String, Value>,
    #[serde(default)]
    pub is_restart: bool,
}

/// Requests the supervisor issues to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Bring the agent session up
    Start(StartParams),

    /// Graceful teardown; the worker exits after responding
    Stop,

    /// Health probe
    Ping,

    /// Worker-side cpu/memory usage
    GetProcessStats,
}

/// Requests a worker issues to the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorCommand {
    /// Start sequence finished; the agent is serving its room
    Ready,

    /// A plugin's context snapshot changed
    SyncContext(ContextSync),

    /// Forward one telemetry signal for central consumption
    SyncTelemetry(TelemetrySignal),
}

/// One plugin-context snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSync {
    pub agent_id: AgentId,
    pub plugin_name: String,
    /// Opaque serializable snapshot (canonical-encoded JSON).
    pub context: Value,
    pub timestamp_ms: u64,
}

/// Worker-side process usage, as returned by `GetProcessStats`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessStats {
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

/// Kind of a telemetry signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Log,
    Metric,
    Trace,
}

/// One telemetry signal, forwarded from worker to supervisor.
///
/// Signals are delivered at-least-once; `id` lets the supervisor dedup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySignal {
    pub id: String,
    pub kind: SignalKind,
    pub name: String,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub attributes: Value,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
