//! Serialization to and parsing of wire payloads.
//!
//! An entity payload contains exactly the fields that are checked and
//! currently acceptable; everything else is omitted (not sent as `null`).
//! Callers must therefore validate, with the same field list, before any
//! operation that sends a payload.

use crate::collection::Collection;
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key names of a paginated collection response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseKeys {
    #[serde(default = "default_count_key")]
    pub count_key: String,
    #[serde(default = "default_results_key")]
    pub results_key: String,
}

fn default_count_key() -> String {
    "count".to_string()
}

fn default_results_key() -> String {
    "results".to_string()
}

impl Default for ResponseKeys {
    fn default() -> Self {
        Self {
            count_key: default_count_key(),
            results_key: default_results_key(),
        }
    }
}

/// Raw items and the server-side count of a collection response.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPayload {
    pub items: Vec<Value>,
    /// `None` for bare arrays.
    pub count: Option<usize>,
}

/// Accepts a bare array or an object carrying the count and results keys.
pub fn parse_collection_payload(payload: Value, keys: &ResponseKeys) -> ModelResult<CollectionPayload> {
    match payload {
        Value::Array(items) => Ok(CollectionPayload { items, count: None }),
        Value::Object(mut object) => {
            let items = match object.remove(&keys.results_key) {
                Some(Value::Array(items)) => items,
                Some(other) => {
                    return Err(ModelError::Payload(format!(
                        "`{}` is not an array: {other}",
                        keys.results_key
                    )));
                }
                None => {
                    return Err(ModelError::Payload(format!(
                        "missing `{}` in collection response",
                        keys.results_key
                    )));
                }
            };
            let count = object
                .get(&keys.count_key)
                .and_then(Value::as_u64)
                .map(|n| n as usize);
            Ok(CollectionPayload { items, count })
        }
        other => Err(ModelError::Payload(format!(
            "expected an array or object, got {other}"
        ))),
    }
}

impl Entity {
    /// Serializes the checked, acceptable fields.
    pub fn to_wire_payload(&self) -> Value {
        let mut out = Map::new();
        for (index, field) in self.schema().fields().iter().enumerate() {
            if !self.checked[index] {
                continue;
            }
            let value = self.value_at(index);
            if field.is_acceptable(value, self) {
                out.insert(field.name().to_string(), field.field_type().to_wire(value));
            }
        }
        Value::Object(out)
    }
}

impl Collection {
    /// Serializes every item through the entity pipeline.
    pub fn to_wire_payload(&self) -> Value {
        Value::Array(self.iter().map(Entity::to_wire_payload).collect())
    }
}
