// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON Schema wrapper used for scope payloads and RPC input/output.

use crate::error::Fault;
use serde_json::Value;
use std::sync::Arc;

/// A compiled JSON Schema.
///
/// Serializes as the raw schema document; compilation happens once at
/// construction so validation on hot paths is allocation-light.
#[derive(Clone)]
pub struct Schema {
    document: Value,
    validator: Arc<jsonschema::Validator>,
}

impl Schema {
    /// Compile a schema document. Invalid documents fail with `Validation`.
    pub fn new(document: Value) -> Result<Self, Fault> {
        let validator = jsonschema::validator_for(&document)
            .map_err(|e| Fault::validation("invalid schema document").with_cause(e))?;
        Ok(Self { document, validator: Arc::new(validator) })
    }

    /// A schema accepting any value.
    pub fn any() -> Self {
        match Self::new(Value::Bool(true)) {
            Ok(schema) => schema,
            Err(_) => unreachable!("the trivial schema always compiles"),
        }
    }

    /// Validate an instance, reporting the first failure's instance path.
    pub fn validate(&self, instance: &Value) -> Result<(), Fault> {
        match self.validator.iter_errors(instance).next() {
            None => Ok(()),
            Some(err) => Err(Fault::validation(format!(
                "schema validation failed at {}: {}",
                err.instance_path, err
            ))),
        }
    }

    /// The raw schema document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Top-level `properties` names, for advertising scope keys.
    pub fn scope_keys(&self) -> Vec<String> {
        self.document
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Schema").field(&self.document).finish()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document
    }
}

impl serde::Serialize for Schema {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.document.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Schema {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = Value::deserialize(deserializer)?;
        Self::new(document).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
