// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session tokens: 256-bit random, base64url, constant-time compared.
//!
//! A session token is minted when a worker starts and returned to the API
//! caller; every subsequent control call echoes it. It never travels over
//! the realtime transport.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Raw entropy per token.
const TOKEN_BYTES: usize = 32;

/// Encoded length of a freshly minted token (43 base64url chars, no padding).
pub const TOKEN_ENCODED_LEN: usize = 43;

/// An opaque 256-bit session credential.
///
/// `Debug` and `Display` never reveal the value; comparison against a
/// presented string is constant-time regardless of where they diverge.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Mint a fresh token from the OS RNG.
    pub fn mint() -> Self {
        let mut raw = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut raw);
        Self(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Constant-time check of a presented token.
    ///
    /// A length mismatch still performs the full-width comparison so the
    /// early exit does not leak how much of the prefix matched.
    pub fn verify(&self, presented: &str) -> bool {
        let ours = self.0.as_bytes();
        let theirs = presented.as_bytes();

        let mut a = [0u8; TOKEN_ENCODED_LEN];
        let mut b = [0u8; TOKEN_ENCODED_LEN];
        for (dst, src) in a.iter_mut().zip(ours.iter()) {
            *dst = *src;
        }
        for (dst, src) in b.iter_mut().zip(theirs.iter()) {
            *dst = *src;
        }

        let lengths_match = ours.len() == theirs.len();
        bool::from(a[..].ct_eq(&b[..])) && lengths_match
    }

    /// The encoded value, for returning to the API caller.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
