// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin runtime state.
//!
//! A plugin keeps an opaque serializable context between restarts. The
//! worker mirrors every change to the supervisor (`sync_context`), which
//! replays the snapshots into the next start, so plugin state survives
//! crashes.

use life_core::PluginDescriptor;
use serde_json::Value;
use tokio::sync::watch;

/// One plugin instance inside a worker.
pub struct PluginRuntime {
    descriptor: PluginDescriptor,
    context_tx: watch::Sender<Value>,
}

impl PluginRuntime {
    /// Construct with the restored snapshot (or `null` on first start).
    pub fn new(descriptor: PluginDescriptor, restored: Option<Value>) -> Self {
        let (context_tx, _) = watch::channel(restored.unwrap_or(Value::Null));
        Self { descriptor, context_tx }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn watches_context(&self) -> bool {
        self.descriptor.watches_context
    }

    /// Current snapshot.
    pub fn context(&self) -> Value {
        self.context_tx.borrow().clone()
    }

    /// Replace the snapshot; observers wake on change.
    pub fn set_context(&self, context: Value) {
        // send only fails with no receivers, which is fine: the value is
        // still stored for later subscribers.
        let _ = self.context_tx.send(context);
    }

    /// Subscribe to context changes.
    pub fn watch(&self) -> watch::Receiver<Value> {
        self.context_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "plugins_tests.rs"]
mod tests;
