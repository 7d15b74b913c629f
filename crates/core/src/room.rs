// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime-transport room vocabulary.

use crate::AgentId;
use serde::{Deserialize, Serialize};

/// A room plus the token that admits one participant to it.
///
/// Two grants exist per session: the agent grant (handed to the worker)
/// and the user grant (returned to the API caller). They name the same
/// room but carry different identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomGrant {
    pub name: String,
    pub token: String,
}

/// Room name for a worker's realtime-transport scope.
pub fn room_name(id: &AgentId) -> String {
    format!("room_{}", id)
}
