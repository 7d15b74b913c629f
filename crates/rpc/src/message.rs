// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC message shapes.
//!
//! Two shapes only. Each message rides one text stream on the `rpc` topic;
//! `input` and the `ok` value carry canonical-form JSON.

use life_core::Fault;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One RPC message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RpcMessage {
    Request {
        id: u64,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },
    Response {
        id: u64,
        result: RpcOutcome,
    },
}

/// The server-side result carried in a Response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RpcOutcome {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    Error {
        fault: Fault,
    },
}

impl RpcOutcome {
    pub fn into_result(self) -> Result<Option<Value>, Fault> {
        match self {
            Self::Ok { value } => Ok(value),
            Self::Error { fault } => Err(fault),
        }
    }
}

impl From<Result<Option<Value>, Fault>> for RpcOutcome {
    fn from(result: Result<Option<Value>, Fault>) -> Self {
        match result {
            Ok(value) => Self::Ok { value },
            Err(fault) => Self::Error { fault },
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
