// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent configuration resolution.
//!
//! Every agent has a local config plus an ordered list of global configs
//! whose directory contains the agent source path. Globals apply
//! deepest-directory-first, so the most specific document wins; the local
//! document is most specific of all. Resolution yields two views: the
//! server view (secrets included, never leaves supervisor/worker) and the
//! client view (secrets redacted, returned to the API caller).

use crate::error::Fault;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Keys whose values never appear in the client view.
const SECRET_KEYS: &[&str] = &["api_key", "api_secret", "token", "secret", "password"];
const SECRET_SUFFIXES: &[&str] = &["_key", "_secret", "_token"];

/// One configuration document, as emitted by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDoc {
    /// Path of the config file; its directory scopes a global doc.
    pub path: PathBuf,
    /// The document body. Must be a JSON object.
    pub values: Value,
}

impl ConfigDoc {
    pub fn new(path: impl Into<PathBuf>, values: Value) -> Self {
        Self { path: path.into(), values }
    }

    fn object(&self) -> Result<&Map<String, Value>, Fault> {
        self.values.as_object().ok_or_else(|| {
            Fault::validation(format!("config {} is not an object", self.path.display()))
        })
    }

    /// Whether this global doc applies to an agent at `source`.
    fn applies_to(&self, source: &Path) -> bool {
        match self.path.parent() {
            Some(dir) => source.starts_with(dir),
            None => true,
        }
    }

    /// Directory depth, for deepest-first ordering.
    fn depth(&self) -> usize {
        self.path.parent().map(|d| d.components().count()).unwrap_or(0)
    }
}

/// The two views produced by resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Full config, secrets included. Stays inside supervisor and worker.
    pub server: Map<String, Value>,
    /// Secrets redacted. Safe to hand to the API caller.
    pub client: Map<String, Value>,
}

/// Resolve an agent's config from its local doc and the global chain.
///
/// Globals that do not contain `source` in their directory are ignored.
/// Merge is deep for objects and replace for everything else.
pub fn resolve_config(
    source: &Path,
    local: &ConfigDoc,
    globals: &[ConfigDoc],
) -> Result<ResolvedConfig, Fault> {
    let mut applicable: Vec<&ConfigDoc> =
        globals.iter().filter(|doc| doc.applies_to(source)).collect();
    // Shallowest first: later merges override, so the deepest global and
    // finally the local doc end up winning.
    applicable.sort_by_key(|doc| doc.depth());

    let mut server = Map::new();
    for doc in applicable {
        merge_into(&mut server, doc.object()?);
    }
    merge_into(&mut server, local.object()?);

    let client = redact(&server);
    Ok(ResolvedConfig { server, client })
}

fn merge_into(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn is_secret_key(key: &str) -> bool {
    SECRET_KEYS.contains(&key) || SECRET_SUFFIXES.iter().any(|suffix| key.ends_with(suffix))
}

fn redact(values: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(values.len());
    for (key, value) in values {
        if is_secret_key(key) {
            continue;
        }
        match value {
            Value::Object(inner) => {
                out.insert(key.clone(), Value::Object(redact(inner)));
            }
            other => {
                out.insert(key.clone(), other.clone());
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
