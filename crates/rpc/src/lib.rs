// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! life-rpc: full-duplex typed request/response over the transport's
//! reserved `rpc` text topic.
//!
//! Either room peer may register procedures and call the other's. Payloads
//! travel in canonical form; values a peer cannot represent fail with
//! `Validation` at the send site. Responses correlate strictly by id and
//! resolve their caller at most once.

pub mod message;
pub mod peer;

pub use message::{RpcMessage, RpcOutcome};
pub use peer::{CallOptions, Procedure, RpcConfig, RpcHandlerFn, RpcPeer, DEFAULT_CALL_TIMEOUT};
