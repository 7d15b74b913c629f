// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical value codec for control and RPC channels.
//!
//! Values exchanged with workers and room peers include timestamps, big
//! integers, sets, maps, faults, URLs, and regular expressions. Plain JSON
//! cannot carry those distinctions, so rich values are wrapped in a tagged
//! object: `{"$life": "<tag>", ...}`. Everything else is emitted as plain
//! JSON, which keeps the common case readable in logs and on the wire.
//!
//! `decode(encode(v))` round-trips exactly. A value that cannot be
//! represented (non-finite float, unknown tag) fails with `Validation` at
//! the send site, never silent coercion.

use crate::error::Fault;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{json, Map, Number, Value};

/// Reserved key marking a tagged (rich) value in the JSON encoding.
pub const TAG_KEY: &str = "$life";

/// A value that round-trips through the control and RPC channels.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers outside the i64 range (carried as decimal strings).
    BigInt(i128),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Url(url::Url),
    Regex { pattern: String, flags: String },
    Fault(Fault),
    List(Vec<CanonicalValue>),
    /// Order-preserving set; duplicates are dropped on construction.
    Set(Vec<CanonicalValue>),
    Map(IndexMap<String, CanonicalValue>),
}

impl CanonicalValue {
    /// Build a set, preserving first-seen order and dropping duplicates.
    pub fn set(items: impl IntoIterator<Item = CanonicalValue>) -> Self {
        let mut out: Vec<CanonicalValue> = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Self::Set(out)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Encode to the tagged-JSON wire form.
    ///
    /// Fails with `Validation` on values JSON cannot carry (NaN, ±inf).
    pub fn encode(&self) -> Result<Value, Fault> {
        Ok(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::BigInt(i) => json!({ TAG_KEY: "bigint", "value": i.to_string() }),
            Self::Float(f) => {
                let n = Number::from_f64(*f).ok_or_else(|| {
                    Fault::validation(format!("non-finite float is not representable: {}", f))
                })?;
                Value::Number(n)
            }
            Self::Text(s) => Value::String(s.clone()),
            Self::Timestamp(ts) => json!({
                TAG_KEY: "timestamp",
                "value": ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
            Self::Url(u) => json!({ TAG_KEY: "url", "value": u.as_str() }),
            Self::Regex { pattern, flags } => json!({
                TAG_KEY: "regex",
                "pattern": pattern,
                "flags": flags,
            }),
            Self::Fault(fault) => json!({
                TAG_KEY: "fault",
                "value": serde_json::to_value(fault)
                    .map_err(|e| Fault::validation("fault is not serializable").with_cause(e))?,
            }),
            Self::List(items) => {
                Value::Array(items.iter().map(|v| v.encode()).collect::<Result<_, _>>()?)
            }
            Self::Set(items) => json!({
                TAG_KEY: "set",
                "value": items.iter().map(|v| v.encode()).collect::<Result<Vec<_>, _>>()?,
            }),
            Self::Map(entries) => {
                let mut obj = Map::with_capacity(entries.len());
                for (k, v) in entries {
                    obj.insert(k.clone(), v.encode()?);
                }
                if entries.contains_key(TAG_KEY) {
                    // A literal "$life" key would collide with the tag
                    // namespace; wrap the whole object once.
                    json!({ TAG_KEY: "escape", "value": Value::Object(obj) })
                } else {
                    Value::Object(obj)
                }
            }
        })
    }

    /// Decode the tagged-JSON wire form.
    pub fn decode(value: &Value) -> Result<Self, Fault> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::BigInt(u as i128)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    return Err(Fault::validation(format!("unrepresentable number: {}", n)));
                }
            }
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => {
                Self::List(items.iter().map(Self::decode).collect::<Result<_, _>>()?)
            }
            Value::Object(obj) => match obj.get(TAG_KEY).and_then(Value::as_str) {
                None => {
                    let mut entries = IndexMap::with_capacity(obj.len());
                    for (k, v) in obj {
                        entries.insert(k.clone(), Self::decode(v)?);
                    }
                    Self::Map(entries)
                }
                Some(tag) => Self::decode_tagged(tag, obj)?,
            },
        })
    }

    fn decode_tagged(tag: &str, obj: &Map<String, Value>) -> Result<Self, Fault> {
        let value = || {
            obj.get("value")
                .ok_or_else(|| Fault::validation(format!("tagged value {:?} missing body", tag)))
        };
        Ok(match tag {
            "bigint" => {
                let s = value()?.as_str().ok_or_else(|| {
                    Fault::validation("bigint body must be a decimal string")
                })?;
                Self::BigInt(
                    s.parse::<i128>()
                        .map_err(|e| Fault::validation("invalid bigint").with_cause(e))?,
                )
            }
            "timestamp" => {
                let s = value()?
                    .as_str()
                    .ok_or_else(|| Fault::validation("timestamp body must be a string"))?;
                let ts = DateTime::parse_from_rfc3339(s)
                    .map_err(|e| Fault::validation("invalid timestamp").with_cause(e))?;
                Self::Timestamp(ts.with_timezone(&Utc))
            }
            "url" => {
                let s = value()?
                    .as_str()
                    .ok_or_else(|| Fault::validation("url body must be a string"))?;
                Self::Url(
                    url::Url::parse(s)
                        .map_err(|e| Fault::validation("invalid url").with_cause(e))?,
                )
            }
            "regex" => {
                let pattern = obj
                    .get("pattern")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Fault::validation("regex missing pattern"))?;
                // Compile to reject patterns the receiver could never use.
                regex::Regex::new(pattern)
                    .map_err(|e| Fault::validation("invalid regex").with_cause(e))?;
                let flags = obj.get("flags").and_then(Value::as_str).unwrap_or("");
                Self::Regex { pattern: pattern.to_string(), flags: flags.to_string() }
            }
            "fault" => {
                let fault: Fault = serde_json::from_value(value()?.clone())
                    .map_err(|e| Fault::validation("invalid fault body").with_cause(e))?;
                Self::Fault(fault)
            }
            "set" => {
                let items = value()?
                    .as_array()
                    .ok_or_else(|| Fault::validation("set body must be an array"))?;
                Self::set(items.iter().map(Self::decode).collect::<Result<Vec<_>, _>>()?)
            }
            "escape" => {
                let inner = value()?
                    .as_object()
                    .ok_or_else(|| Fault::validation("escape body must be an object"))?;
                let mut entries = IndexMap::with_capacity(inner.len());
                for (k, v) in inner {
                    entries.insert(k.clone(), Self::decode(v)?);
                }
                Self::Map(entries)
            }
            other => {
                return Err(Fault::validation(format!("unknown canonical tag: {:?}", other)))
            }
        })
    }
}

impl From<bool> for CanonicalValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for CanonicalValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for CanonicalValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

#[cfg(test)]
#[path = "canonical_tests.rs"]
mod tests;
