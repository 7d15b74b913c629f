// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use life_core::ErrorCode;
use serde_json::json;

fn config(value: serde_json::Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("config fixture must be an object"),
    }
}

#[test]
fn absent_sections_build_nothing() {
    let config = config(json!({ "greeting": "hi" }));
    assert!(llm_chain(&config).unwrap().is_none());
    assert!(stt_provider(&config).unwrap().is_none());
}

#[test]
fn llm_section_builds_a_chain_with_fallbacks() {
    let config = config(json!({
        "llm": {
            "base_url": "https://llm.example/v1",
            "api_key": "k",
            "model": "m-large",
            "temperature": 0.4,
            "fallbacks": [
                { "base_url": "https://backup.example/v1", "api_key": "k2", "model": "m-small" },
            ],
        },
    }));
    assert!(llm_chain(&config).unwrap().is_some());
}

#[test]
fn missing_llm_key_is_validation_naming_the_path() {
    let config = config(json!({
        "llm": { "base_url": "https://llm.example/v1", "model": "m" },
    }));
    let err = llm_chain(&config).unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(err.message.unwrap_or_default().contains("llm.api_key"));
}

#[test]
fn bad_fallback_names_its_index() {
    let config = config(json!({
        "llm": {
            "base_url": "u", "api_key": "k", "model": "m",
            "fallbacks": [{ "base_url": "u2", "api_key": "k2" }],
        },
    }));
    let err = llm_chain(&config).unwrap_err();
    assert!(err.message.unwrap_or_default().contains("llm.fallbacks[0].model"));
}

#[test]
fn stt_section_builds_a_websocket_provider() {
    let config = config(json!({
        "stt": { "url": "wss://stt.example/listen", "api_key": "k" },
    }));
    assert!(stt_provider(&config).unwrap().is_some());
}

#[test]
fn missing_stt_url_is_validation() {
    let config = config(json!({ "stt": { "api_key": "k" } }));
    let err = stt_provider(&config).unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);
}
