// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build-index access from inside a worker.
//!
//! The compiler emits one `<name>.json` per agent into the build directory;
//! a worker loads exactly the entry it was started for.

use life_core::{AgentDefinition, Fault};
use std::path::Path;

/// Load one agent definition by name.
pub fn load_definition(build_dir: &Path, name: &str) -> Result<AgentDefinition, Fault> {
    let path = build_dir.join(format!("{}.json", name));
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Fault::not_found(format!("no build index entry for agent {:?}", name)));
        }
        Err(e) => {
            return Err(Fault::unknown(format!("cannot read {}", path.display())).with_cause(e));
        }
    };

    let definition: AgentDefinition = serde_json::from_slice(&bytes).map_err(|e| {
        Fault::validation(format!("invalid agent definition {}", path.display())).with_cause(e)
    })?;

    if definition.name != name {
        return Err(Fault::validation(format!(
            "definition name {:?} does not match file stem {:?}",
            definition.name, name
        )));
    }
    Ok(definition)
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
