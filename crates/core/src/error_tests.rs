// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    validation = { ErrorCode::Validation, "Validation" },
    not_found = { ErrorCode::NotFound, "NotFound" },
    conflict = { ErrorCode::Conflict, "Conflict" },
    forbidden = { ErrorCode::Forbidden, "Forbidden" },
    timeout = { ErrorCode::Timeout, "Timeout" },
    upstream = { ErrorCode::Upstream, "Upstream" },
    not_implemented = { ErrorCode::NotImplemented, "NotImplemented" },
    unknown = { ErrorCode::Unknown, "Unknown" },
)]
fn code_display_matches_wire_name(code: ErrorCode, expected: &str) {
    assert_eq!(code.to_string(), expected);
    let json = serde_json::to_string(&code).unwrap();
    assert_eq!(json, format!("\"{}\"", expected));
}

#[test]
fn public_flag_survives_obfuscation() {
    let fault = Fault::not_found("no such procedure").public();
    let out = fault.clone().obfuscated();
    assert_eq!(out, fault);
}

#[test]
fn private_fault_obfuscates_to_bare_unknown() {
    let fault = Fault::upstream("provider leaked internals").with_cause("stack trace");
    let out = fault.obfuscated();
    assert_eq!(out.code, ErrorCode::Unknown);
    assert!(out.message.is_none());
    assert!(out.cause.is_none());
}

#[test]
fn public_flag_is_not_serialized() {
    let fault = Fault::validation("bad input").public();
    let json = serde_json::to_value(&fault).unwrap();
    assert!(json.get("public").is_none());

    let back: Fault = serde_json::from_value(json).unwrap();
    assert!(!back.public, "deserialized faults are non-public by default");
}

#[test]
fn hinted_preserves_code_and_appends_pointer() {
    let fault = Fault::timeout("health ping timed out").hinted("echo", "agent_1");
    assert_eq!(fault.code, ErrorCode::Timeout);
    assert_eq!(
        fault.message.as_deref(),
        Some("health ping timed out. See agent echo (agent_1) logs for more details.")
    );
}

#[test]
fn hinted_on_bare_fault_uses_code_as_subject() {
    let fault = Fault::bare(ErrorCode::Conflict).hinted("calc", "agent_2");
    assert_eq!(
        fault.message.as_deref(),
        Some("Conflict. See agent calc (agent_2) logs for more details.")
    );
}

#[test]
fn display_includes_message_and_cause() {
    let fault = Fault::upstream("bad response").with_cause("503");
    assert_eq!(fault.to_string(), "Upstream: bad response (503)");
}
