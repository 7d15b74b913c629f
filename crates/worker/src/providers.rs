// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider construction from resolved agent config.
//!
//! The server view of the agent's config carries the provider credentials.
//! `llm` holds the primary config plus optional `fallbacks`; `stt` holds
//! the live-channel settings. Both sections are optional; an agent
//! without them simply runs without that capability.

use life_core::Fault;
use life_provider::llm::{OpenAiConfig, OpenAiLlm};
use life_provider::stt::{WsStt, WsSttConfig};
use life_provider::{LlmChain, LlmProvider, SttProvider};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Build the LLM chain from `config.llm`, if present.
pub fn llm_chain(config: &Map<String, Value>) -> Result<Option<Arc<LlmChain>>, Fault> {
    let Some(section) = config.get("llm") else {
        return Ok(None);
    };

    let primary = openai_config(section, "llm")?;
    let mut fallbacks = Vec::new();
    if let Some(entries) = section.get("fallbacks").and_then(Value::as_array) {
        for (i, entry) in entries.iter().enumerate() {
            fallbacks.push(LlmProvider::OpenAiCompatible(OpenAiLlm::new(openai_config(
                entry,
                &format!("llm.fallbacks[{}]", i),
            )?)));
        }
    }

    Ok(Some(Arc::new(LlmChain::new(
        LlmProvider::OpenAiCompatible(OpenAiLlm::new(primary)),
        fallbacks,
    ))))
}

/// Build the STT provider from `config.stt`, if present.
pub fn stt_provider(config: &Map<String, Value>) -> Result<Option<Arc<SttProvider>>, Fault> {
    let Some(section) = config.get("stt") else {
        return Ok(None);
    };

    let url = require_str(section, "url", "stt")?;
    let api_key = require_str(section, "api_key", "stt")?;
    Ok(Some(Arc::new(SttProvider::WebSocket(WsStt::new(WsSttConfig { url, api_key })))))
}

fn openai_config(section: &Value, at: &str) -> Result<OpenAiConfig, Fault> {
    Ok(OpenAiConfig {
        base_url: require_str(section, "base_url", at)?,
        api_key: require_str(section, "api_key", at)?,
        model: require_str(section, "model", at)?,
        temperature: section.get("temperature").and_then(Value::as_f64).map(|t| t as f32),
    })
}

fn require_str(section: &Value, key: &str, at: &str) -> Result<String, Fault> {
    section
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Fault::validation(format!("config {}.{} must be a string", at, key)))
}

#[cfg(test)]
#[path = "providers_tests.rs"]
mod tests;
