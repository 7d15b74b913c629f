// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-process cpu/memory for the supervisor's `ping`/`info` surface.

use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{ProcessesToUpdate, System};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CpuStats {
    pub used_percent: f32,
    /// Accumulated CPU time of the supervisor process, in nanoseconds.
    pub used_ns: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemoryStats {
    pub used_percent: f32,
    pub total: u64,
    pub free: u64,
    pub used: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct HostStats {
    pub cpu: CpuStats,
    pub memory: MemoryStats,
}

/// Stats collector; keeps one `System` so cpu percentages are measured
/// between consecutive calls rather than guessed.
pub struct StatsCollector {
    system: Mutex<System>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self { system: Mutex::new(System::new()) }
    }

    pub fn collect(&self) -> HostStats {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        system.refresh_memory();

        let used_ns = sysinfo::get_current_pid()
            .ok()
            .and_then(|pid| {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                system.process(pid).map(|p| p.accumulated_cpu_time().saturating_mul(1_000_000))
            })
            .unwrap_or(0);

        let total = system.total_memory();
        let free = system.free_memory();
        let used = system.used_memory();
        HostStats {
            cpu: CpuStats { used_percent: system.global_cpu_usage(), used_ns },
            memory: MemoryStats {
                used_percent: if total == 0 { 0.0 } else { used as f32 * 100.0 / total as f32 },
                total,
                free,
                used,
            },
        }
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
