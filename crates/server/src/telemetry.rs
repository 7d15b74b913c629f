// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Central telemetry consumption.
//!
//! Workers forward their signals at-least-once over the control channel;
//! the hub deduplicates by signal id and hands unique signals to the
//! configured exporter. Process-wide lifecycle is explicit: construct at
//! startup, `flush` before exit.

use life_ipc::TelemetrySignal;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::info;

/// Bound on the dedup window.
const SEEN_CAPACITY: usize = 4096;

/// Receives unique signals.
pub trait TelemetryExporter: Send + Sync + 'static {
    fn export(&self, signal: &TelemetrySignal);

    /// Drain any buffered state. Default: nothing to drain.
    fn flush(&self) {}
}

/// Exporter that writes signals to the supervisor log.
#[derive(Default)]
pub struct LogExporter;

impl TelemetryExporter for LogExporter {
    fn export(&self, signal: &TelemetrySignal) {
        info!(
            target: "telemetry",
            id = %signal.id,
            kind = ?signal.kind,
            name = %signal.name,
            timestamp_ms = signal.timestamp_ms,
            "signal"
        );
    }
}

struct SeenWindow {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

/// The supervisor's telemetry consumer.
pub struct TelemetryHub {
    exporter: Arc<dyn TelemetryExporter>,
    seen: Mutex<SeenWindow>,
    disabled: bool,
}

impl TelemetryHub {
    pub fn new(exporter: Arc<dyn TelemetryExporter>) -> Arc<Self> {
        let disabled = std::env::var_os(life_core::ENV_TELEMETRY_DISABLED).is_some();
        Arc::new(Self {
            exporter,
            seen: Mutex::new(SeenWindow {
                ids: HashSet::with_capacity(SEEN_CAPACITY),
                order: VecDeque::with_capacity(SEEN_CAPACITY),
            }),
            disabled,
        })
    }

    /// Consume one signal; duplicates (by id) are dropped.
    pub fn ingest(&self, signal: TelemetrySignal) {
        if self.disabled {
            return;
        }
        {
            let mut seen = self.seen.lock();
            if !seen.ids.insert(signal.id.clone()) {
                return;
            }
            seen.order.push_back(signal.id.clone());
            if seen.order.len() > SEEN_CAPACITY {
                if let Some(oldest) = seen.order.pop_front() {
                    seen.ids.remove(&oldest);
                }
            }
        }
        self.exporter.export(&signal);
    }

    /// End-of-life drain.
    pub fn flush(&self) {
        self.exporter.flush();
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
