// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build-index loading.
//!
//! The external compiler emits one `<name>.json` per agent into the build
//! directory. The file is both the definition and the agent's signal file:
//! its content hash changes iff the built definition changed, which is what
//! the hot-reload watcher keys on.

use life_core::{AgentDefinition, BuildEntry, Fault};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One row of `available()`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AvailableAgent {
    pub name: String,
    pub scope_keys: Vec<String>,
}

/// The deserialized build index, keyed by agent name.
#[derive(Debug)]
pub struct BuildIndex {
    dir: PathBuf,
    entries: HashMap<String, BuildEntry>,
}

impl BuildIndex {
    /// Load every `*.json` definition in `dir`.
    ///
    /// Unparseable files fail the load: a broken build index is a
    /// deployment error, not something to limp past.
    pub fn load(dir: &Path) -> Result<Self, Fault> {
        let mut entries = HashMap::new();
        let listing = std::fs::read_dir(dir).map_err(|e| {
            Fault::validation(format!("cannot read build directory {}", dir.display()))
                .with_cause(e)
        })?;

        for item in listing {
            let path = match item {
                Ok(item) => item.path(),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable build dir entry");
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let entry = load_entry(&path)?;
            debug!(name = %entry.definition.name, sha = %entry.sha, "loaded agent definition");
            entries.insert(entry.definition.name.clone(), entry);
        }

        Ok(Self { dir: dir.to_path_buf(), entries })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, name: &str) -> Option<&BuildEntry> {
        self.entries.get(name)
    }

    /// Stored content hash for an agent's signal file.
    pub fn sha(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.sha.as_str())
    }

    /// Re-read one agent's definition file. Returns true if the content
    /// hash changed (and the entry was replaced).
    pub fn reload(&mut self, name: &str) -> Result<bool, Fault> {
        let path = self.dir.join(format!("{}.json", name));
        let entry = load_entry(&path)?;
        let changed = self.entries.get(name).map(|e| e.sha != entry.sha).unwrap_or(true);
        if changed {
            self.entries.insert(name.to_string(), entry);
        }
        Ok(changed)
    }

    /// Everything an API caller may create.
    pub fn available(&self) -> Vec<AvailableAgent> {
        let mut out: Vec<AvailableAgent> = self
            .entries
            .values()
            .map(|entry| AvailableAgent {
                name: entry.definition.name.clone(),
                scope_keys: entry.definition.scope.schema.scope_keys(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

/// Hex SHA-256 of a byte slice.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn load_entry(path: &Path) -> Result<BuildEntry, Fault> {
    let bytes = std::fs::read(path).map_err(|e| {
        Fault::not_found(format!("cannot read definition {}", path.display())).with_cause(e)
    })?;
    let definition: AgentDefinition = serde_json::from_slice(&bytes).map_err(|e| {
        Fault::validation(format!("invalid agent definition {}", path.display())).with_cause(e)
    })?;
    Ok(BuildEntry { definition, sha: content_hash(&bytes) })
}

#[cfg(test)]
#[path = "build_index_tests.rs"]
mod tests;
