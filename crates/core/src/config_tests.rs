// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ErrorCode;
use serde_json::json;
use std::path::Path;

fn doc(path: &str, values: serde_json::Value) -> ConfigDoc {
    ConfigDoc::new(path, values)
}

#[test]
fn deeper_global_wins_over_shallower() {
    let shallow = doc("/app/life.config.json", json!({ "model": "small", "voice": "a" }));
    let deep = doc("/app/agents/life.config.json", json!({ "model": "large" }));
    let local = doc("/app/agents/echo/config.json", json!({}));

    let resolved = resolve_config(
        Path::new("/app/agents/echo/agent.ts"),
        &local,
        &[shallow, deep],
    )
    .unwrap();

    assert_eq!(resolved.server.get("model"), Some(&json!("large")));
    assert_eq!(resolved.server.get("voice"), Some(&json!("a")));
}

#[test]
fn local_doc_is_most_specific() {
    let global = doc("/app/life.config.json", json!({ "model": "global" }));
    let local = doc("/app/agents/echo/config.json", json!({ "model": "local" }));

    let resolved =
        resolve_config(Path::new("/app/agents/echo/agent.ts"), &local, &[global]).unwrap();
    assert_eq!(resolved.server.get("model"), Some(&json!("local")));
}

#[test]
fn global_outside_source_path_is_ignored() {
    let unrelated = doc("/elsewhere/life.config.json", json!({ "model": "wrong" }));
    let local = doc("/app/agents/echo/config.json", json!({ "model": "right" }));

    let resolved =
        resolve_config(Path::new("/app/agents/echo/agent.ts"), &local, &[unrelated]).unwrap();
    assert_eq!(resolved.server.get("model"), Some(&json!("right")));
}

#[test]
fn nested_objects_merge_deeply() {
    let global = doc(
        "/app/life.config.json",
        json!({ "llm": { "model": "gpt", "temperature": 0.2 } }),
    );
    let local = doc(
        "/app/agents/echo/config.json",
        json!({ "llm": { "temperature": 0.7 } }),
    );

    let resolved =
        resolve_config(Path::new("/app/agents/echo/agent.ts"), &local, &[global]).unwrap();
    assert_eq!(
        resolved.server.get("llm"),
        Some(&json!({ "model": "gpt", "temperature": 0.7 }))
    );
}

#[test]
fn client_view_redacts_secrets_recursively() {
    let local = doc(
        "/app/agents/echo/config.json",
        json!({
            "api_key": "sk-123",
            "voice_token": "t",
            "llm": { "api_secret": "s", "model": "gpt" },
            "greeting": "hi",
        }),
    );

    let resolved =
        resolve_config(Path::new("/app/agents/echo/agent.ts"), &local, &[]).unwrap();

    // Server view keeps everything.
    assert_eq!(resolved.server.get("api_key"), Some(&json!("sk-123")));

    // Client view drops secret keys at every depth.
    assert!(resolved.client.get("api_key").is_none());
    assert!(resolved.client.get("voice_token").is_none());
    assert_eq!(resolved.client.get("llm"), Some(&json!({ "model": "gpt" })));
    assert_eq!(resolved.client.get("greeting"), Some(&json!("hi")));
}

#[test]
fn non_object_doc_fails_validation() {
    let local = doc("/app/agents/echo/config.json", json!("not an object"));
    let err = resolve_config(Path::new("/app/agents/echo/agent.ts"), &local, &[]).unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);
}
