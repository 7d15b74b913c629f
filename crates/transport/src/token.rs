// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Room token minting.
//!
//! The supervisor mints two grants per session: one for the worker, one
//! for the user client. Real transport providers plug in behind
//! [`TokenSource`]; the built-in source signs HS256 JWTs from env
//! credentials, which is the shape most realtime providers accept.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use life_core::{Fault, RoomGrant};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;

/// Env var naming the transport server URL.
pub const ENV_URL: &str = "LIFE_TRANSPORT_URL";
/// Env var naming the API key (token issuer).
pub const ENV_API_KEY: &str = "LIFE_TRANSPORT_API_KEY";
/// Env var naming the API secret (token signing key).
pub const ENV_API_SECRET: &str = "LIFE_TRANSPORT_API_SECRET";

/// Mints tokens that admit one identity to one room.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn mint(&self, room: &str, identity: &str, ttl: Duration) -> Result<RoomGrant, Fault>;
}

/// Token source configured from environment variables.
#[derive(Clone, Debug)]
pub struct EnvTokenSource {
    url: String,
    api_key: String,
    api_secret: String,
}

impl EnvTokenSource {
    /// Read credentials from the environment.
    ///
    /// Fails with `Validation` naming the first missing variable.
    pub fn from_env() -> Result<Self, Fault> {
        Ok(Self {
            url: require(ENV_URL)?,
            api_key: require(ENV_API_KEY)?,
            api_secret: require(ENV_API_SECRET)?,
        })
    }

    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self { url: url.into(), api_key: api_key.into(), api_secret: api_secret.into() }
    }

    /// The transport server URL the client should dial.
    pub fn server_url(&self) -> &str {
        &self.url
    }

    fn sign(&self, room: &str, identity: &str, ttl: Duration) -> Result<String, Fault> {
        let now = chrono::Utc::now().timestamp();
        let header = json!({ "alg": "HS256", "typ": "JWT" });
        let claims = json!({
            "iss": self.api_key,
            "sub": identity,
            "nbf": now,
            "exp": now + ttl.as_secs() as i64,
            "room": room,
        });

        let mut token = String::new();
        token.push_str(&encode_part(&header)?);
        token.push('.');
        token.push_str(&encode_part(&claims)?);

        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| Fault::validation("invalid transport API secret").with_cause(e))?;
        mac.update(token.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        token.push('.');
        token.push_str(&signature);
        Ok(token)
    }
}

fn require(name: &str) -> Result<String, Fault> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Fault::validation(format!("missing environment variable {}", name))),
    }
}

fn encode_part(value: &serde_json::Value) -> Result<String, Fault> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| Fault::validation("unserializable token part").with_cause(e))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[async_trait]
impl TokenSource for EnvTokenSource {
    async fn mint(&self, room: &str, identity: &str, ttl: Duration) -> Result<RoomGrant, Fault> {
        let token = self.sign(room, identity, ttl)?;
        Ok(RoomGrant { name: room.to_string(), token })
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
