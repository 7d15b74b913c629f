// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration from the environment.

use life_core::Fault;
use std::path::PathBuf;

/// Env var overriding the state directory.
pub const ENV_STATE_DIR: &str = "LIFE_STATE_DIR";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/life)
    pub state_dir: PathBuf,
    /// Build-index directory produced by the compiler
    pub build_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to the supervisor log file
    pub log_path: PathBuf,
}

impl Config {
    /// Resolve paths from `LIFE_STATE_DIR` (or the XDG state dir) and the
    /// required `LIFE_BUILD_DIR`.
    pub fn load() -> Result<Self, Fault> {
        let state_dir = match std::env::var_os(ENV_STATE_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::state_dir()
                .ok_or_else(|| Fault::validation("could not determine state directory"))?
                .join("life"),
        };
        let build_dir = std::env::var_os(life_core::ENV_BUILD_DIR)
            .map(PathBuf::from)
            .ok_or_else(|| {
                Fault::validation(format!(
                    "missing environment variable {}",
                    life_core::ENV_BUILD_DIR
                ))
            })?;

        Ok(Self {
            lock_path: state_dir.join("lifed.pid"),
            log_path: state_dir.join("lifed.log"),
            state_dir,
            build_dir,
        })
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
