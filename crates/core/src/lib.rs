// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! life-core: shared vocabulary of the life runtime.
//!
//! Everything the supervisor, workers, and providers agree on lives here:
//! the error taxonomy, typed IDs, the canonical value codec used on every
//! message channel, session tokens, schemas, and agent definitions.

pub mod canonical;
pub mod clock;
pub mod config;
pub mod definition;
pub mod error;
pub mod id;
pub mod room;
pub mod schema;
pub mod token;

pub use canonical::CanonicalValue;
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{resolve_config, ConfigDoc, ResolvedConfig};
pub use definition::{AccessRule, AgentDefinition, BuildEntry, PluginDescriptor, ScopeSpec};
pub use error::{ErrorCode, Fault};
pub use room::{room_name, RoomGrant};
pub use schema::Schema;
pub use token::SessionToken;

crate::define_id! {
    /// Identifier for one agent worker (one conversation session).
    pub struct AgentId("agent_");
}

crate::define_id! {
    /// Identifier for one in-flight provider job (LLM or STT).
    pub struct JobId("job_");
}

/// Env var naming the build-index directory (read by supervisor and worker).
pub const ENV_BUILD_DIR: &str = "LIFE_BUILD_DIR";

/// Env var the supervisor sets in children to disable local telemetry;
/// signals are forwarded and deduplicated centrally instead.
pub const ENV_TELEMETRY_DISABLED: &str = "LIFE_TELEMETRY_DISABLED";
