// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent definitions, as produced by the external compiler.
//!
//! A definition is immutable per agent name. The supervisor loads one per
//! build-index file; the worker loads the same file to construct its agent.

use crate::config::ConfigDoc;
use crate::error::Fault;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One plugin carried by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    /// Whether the plugin publishes context changes to the supervisor.
    #[serde(default = "default_true")]
    pub watches_context: bool,
}

fn default_true() -> bool {
    true
}

/// Access policy for `agent.start`.
///
/// Richer policies belong to the compiler layer; at runtime the check is
/// data-driven and total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessRule {
    /// Any caller may start a session.
    Open,
    /// No caller may start a session (agent is disabled).
    Never,
    /// The request must carry `key` with the same value as the scope.
    MatchKey { key: String },
}

impl Default for AccessRule {
    fn default() -> Self {
        Self::Open
    }
}

/// Scope contract: the schema a scope payload must satisfy, plus the
/// access rule relating the caller's request to that scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeSpec {
    pub schema: Schema,
    #[serde(default)]
    pub access: AccessRule,
}

impl ScopeSpec {
    /// Whether `request` is allowed to start a session with `scope`.
    pub fn has_access(&self, request: &Value, scope: &Value) -> bool {
        match &self.access {
            AccessRule::Open => true,
            AccessRule::Never => false,
            AccessRule::MatchKey { key } => match (request.get(key), scope.get(key)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

/// An immutable, named unit of conversational behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub scope: ScopeSpec,
    #[serde(default)]
    pub plugins: Vec<PluginDescriptor>,
    /// Path of the agent's source file, used to select global configs.
    pub source: std::path::PathBuf,
    /// The agent's local config document.
    pub config: ConfigDoc,
    /// Ordered global config documents emitted alongside the definition.
    #[serde(default)]
    pub global_configs: Vec<ConfigDoc>,
}

impl AgentDefinition {
    /// Resolve this definition's configuration (server + client views).
    pub fn resolve_config(&self) -> Result<crate::config::ResolvedConfig, Fault> {
        crate::config::resolve_config(&self.source, &self.config, &self.global_configs)
    }
}

/// One build-index entry: a definition plus the content hash of the file
/// it was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEntry {
    pub definition: AgentDefinition,
    /// Hex content hash of the definition file (doubles as the signal hash).
    pub sha: String,
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
