// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hot reload of agent definitions.
//!
//! The build directory is watched for changes; events for one file are
//! debounced with a short stability window so a compiler writing in
//! several syscalls triggers one reload. The content-hash check lives in
//! [`LifeServer::definition_changed`], so touches that leave bytes
//! unchanged never restart anything.

use crate::server::LifeServer;
use life_core::Fault;
use notify::{RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Stability window before a changed signal file is acted on.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Watches the build directory and drives definition reloads.
pub struct ReloadWatcher {
    // Held for its Drop: dropping stops the native watcher.
    _watcher: notify::RecommendedWatcher,
    task: tokio::task::JoinHandle<()>,
}

impl ReloadWatcher {
    /// Watch `server`'s build directory.
    pub fn spawn(server: Arc<LifeServer>) -> Result<Self, Fault> {
        let dir = server.build_dir();
        let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            match event {
                Ok(event) => {
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
                Err(e) => warn!(error = %e, "build watcher error"),
            }
        })
        .map_err(|e| Fault::unknown("cannot create build watcher").with_cause(e))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                Fault::unknown(format!("cannot watch {}", dir.display())).with_cause(e)
            })?;

        let task = tokio::spawn(debounce_loop(server, rx));
        Ok(Self { _watcher: watcher, task })
    }
}

impl Drop for ReloadWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Agent name for a signal path: the file stem of a `.json` file.
fn signal_name(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

async fn debounce_loop(server: Arc<LifeServer>, mut rx: mpsc::UnboundedReceiver<PathBuf>) {
    // Per-agent deadline; an event within the window pushes it out.
    let mut pending: HashMap<String, Instant> = HashMap::new();

    loop {
        let next_deadline = pending.values().min().copied();
        let event = match next_deadline {
            None => rx.recv().await,
            Some(deadline) => tokio::select! {
                event = rx.recv() => event,
                _ = tokio::time::sleep_until(deadline) => {
                    let now = Instant::now();
                    let due: Vec<String> = pending
                        .iter()
                        .filter(|(_, at)| **at <= now)
                        .map(|(name, _)| name.clone())
                        .collect();
                    for name in due {
                        pending.remove(&name);
                        match server.definition_changed(&name).await {
                            Ok(0) => debug!(name, "signal event without content change"),
                            Ok(n) => debug!(name, restarted = n, "definition reloaded"),
                            Err(fault) => {
                                warn!(name, error = %fault, "definition reload failed")
                            }
                        }
                    }
                    continue;
                }
            },
        };

        match event {
            Some(path) => {
                if let Some(name) = signal_name(&path) {
                    pending.insert(name, Instant::now() + DEBOUNCE_WINDOW);
                }
            }
            None => return,
        }
    }
}

#[cfg(test)]
#[path = "reload_tests.rs"]
mod tests;
