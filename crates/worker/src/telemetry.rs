// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side telemetry queue.
//!
//! Signals produced inside the worker are queued and forwarded to the
//! supervisor over the control channel (`sync_telemetry`), which dedups
//! and exports centrally. Forwarding is at-least-once with drop-on-error;
//! failures go to a dedicated error log target. When the supervisor set
//! `LIFE_TELEMETRY_DISABLED` in our environment, everything is dropped at
//! the door.

use life_ipc::{ControlChannel, SupervisorCommand, TelemetrySignal};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::error;

/// Flush budget applied before a worker exits on an uncaught error.
pub const EXIT_FLUSH_BUDGET: Duration = Duration::from_secs(1);

enum Entry {
    Signal(TelemetrySignal),
    /// Resolves once everything queued before it was forwarded.
    Marker(oneshot::Sender<()>),
}

/// Queue half handed to signal producers.
#[derive(Clone)]
pub struct TelemetryQueue {
    tx: mpsc::UnboundedSender<Entry>,
    disabled: bool,
}

impl TelemetryQueue {
    /// Create the queue and start the forwarding task.
    pub fn start(channel: Arc<ControlChannel>, disabled: bool) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Entry>();
        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                match entry {
                    Entry::Signal(signal) => {
                        let command = SupervisorCommand::SyncTelemetry(signal);
                        if let Err(fault) = channel.call(&command).await {
                            // Drop on error; never block or crash the agent.
                            error!(target: "telemetry", error = %fault, "dropped signal");
                        }
                    }
                    Entry::Marker(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { tx, disabled }
    }

    /// Queue one signal. Fire-and-forget.
    pub fn record(&self, signal: TelemetrySignal) {
        if self.disabled {
            return;
        }
        let _ = self.tx.send(Entry::Signal(signal));
    }

    /// Drain everything queued so far, bounded by `budget`.
    pub async fn flush(&self, budget: Duration) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Entry::Marker(done_tx)).is_err() {
            return;
        }
        let _ = tokio::time::timeout(budget, done_rx).await;
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
