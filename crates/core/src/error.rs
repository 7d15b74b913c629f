// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across every boundary of the runtime.
//!
//! Errors travel as values. [`Fault`] is the wire shape: a load-bearing
//! [`ErrorCode`] plus informational message and cause. Crate-internal errors
//! are `thiserror` enums that convert into a `Fault` at the boundary where
//! they leave the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The eight load-bearing error codes.
///
/// Codes are contract; messages are informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Input or schema failure (config parse, RPC schemas, canonical codec)
    Validation,
    /// Named resource absent (unknown agent name, missing RPC procedure)
    NotFound,
    /// State machine violation (stop while starting, restart before start)
    Conflict,
    /// Auth failure (scope access denied, session-token mismatch)
    Forbidden,
    /// Deadline exceeded (RPC call, graceful stop, health ping)
    Timeout,
    /// External service returned no/invalid content
    Upstream,
    /// Capability absent on this platform
    NotImplemented,
    /// Any other cause; wrap and log
    Unknown,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "Validation",
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::Forbidden => "Forbidden",
            Self::Timeout => "Timeout",
            Self::Upstream => "Upstream",
            Self::NotImplemented => "NotImplemented",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// An error as a value, as carried on every message channel.
///
/// `public` is never serialized: it only drives the RPC layer's obfuscation
/// policy for untrusted peers. A deserialized fault is non-public by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip)]
    pub public: bool,
}

impl Fault {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: Some(message.into()), cause: None, public: false }
    }

    /// A bare fault carrying only its code.
    pub fn bare(code: ErrorCode) -> Self {
        Self { code, message: None, cause: None, public: false }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Upstream, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotImplemented, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }

    /// Mark this fault as safe to cross an untrusted boundary unchanged.
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    /// Attach the stringified source error as the cause.
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    /// Replace a non-public fault with a bare `Unknown` (RPC obfuscation).
    pub fn obfuscated(self) -> Self {
        if self.public {
            self
        } else {
            Self { code: ErrorCode::Unknown, message: None, cause: None, public: false }
        }
    }

    /// Decorate a worker fault for the supervisor's public API.
    ///
    /// Preserves the code; the message gains a pointer to the worker logs:
    /// `"<message>. See agent <name> (<id>) logs for more details."`
    pub fn hinted(mut self, agent_name: &str, agent_id: &str) -> Self {
        let what = self.message.take().unwrap_or_else(|| self.code.to_string());
        self.message = Some(format!(
            "{}. See agent {} ({}) logs for more details.",
            what.trim_end_matches('.'),
            agent_name,
            agent_id
        ));
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.cause) {
            (Some(msg), Some(cause)) => write!(f, "{}: {} ({})", self.code, msg, cause),
            (Some(msg), None) => write!(f, "{}: {}", self.code, msg),
            (None, _) => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for Fault {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
