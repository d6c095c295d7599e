//! Field type contracts.
//!
//! A contract bundles the five operations every field type must provide:
//! default generation, blankness, validity, and the two wire conversions.
//! Scalar types are stateless and live in [`ScalarType`]; association types
//! are parameterized by the schema they reference and are created with
//! [`belongs_to`], [`has_one`] and [`has_many`].
//!
//! `is_valid` is false-total: it never panics, it only answers `false` for
//! values of the wrong shape. `from_wire` never fails either; input it cannot
//! interpret is kept as [`FieldValue::Json`] (or raw text) so that validation
//! reports it later.

use crate::collection::Collection;
use crate::entity::Entity;
use crate::schema::Schema;
use crate::value::FieldValue;
use chrono::{DateTime, NaiveDate, Utc};
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, LazyLock};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9(][0-9 ().\-]{5,19}$").expect("valid phone pattern"));

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?|ftp)://[^\s/$.?#][^\s]*$").expect("valid url pattern")
});

/// Keys of the default address object.
pub const ADDRESS_KEYS: [&str; 4] = ["street", "city", "postal_code", "country"];

/// The capability interface every field type implements.
pub trait FieldTypeContract: Send + Sync + fmt::Debug {
    /// Registry name of the type (e.g. `"email"`).
    fn name(&self) -> &str;

    /// Produces a default value. `owner_key` is the primary key of the
    /// record being built, when it is already known.
    fn default_value(&self, owner_key: Option<&FieldValue>) -> FieldValue;

    fn is_blank(&self, value: &FieldValue) -> bool;

    fn is_valid(&self, value: &FieldValue) -> bool;

    /// Serializes a value into its wire representation.
    fn to_wire(&self, value: &FieldValue) -> Value;

    /// Deserializes a wire value.
    fn from_wire(&self, value: Value) -> FieldValue;

    /// Association details, for types that reference another schema.
    fn association(&self) -> Option<Association<'_>> {
        None
    }
}

/// The three association flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// A single foreign-keyed sub-entity.
    BelongsTo,
    /// Exactly one dependent sub-entity sharing the owner's key.
    HasOne,
    /// An ordered collection of sub-entities.
    HasMany,
}

/// Borrowed view of an association contract.
#[derive(Debug, Clone, Copy)]
pub struct Association<'a> {
    pub kind: AssociationKind,
    pub schema: &'a Arc<Schema>,
}

// ── Scalar types ────────────────────────────────────────────────

/// Built-in stateless field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Text,
    Identifier,
    Email,
    Phone,
    Url,
    File,
    Ip,
    Boolean,
    Integer,
    Float,
    Date,
    DateTime,
    Address,
    Object,
    Array,
}

impl ScalarType {
    /// Every built-in scalar type, in registry order.
    pub const ALL: [ScalarType; 15] = [
        Self::Text,
        Self::Identifier,
        Self::Email,
        Self::Phone,
        Self::Url,
        Self::File,
        Self::Ip,
        Self::Boolean,
        Self::Integer,
        Self::Float,
        Self::Date,
        Self::DateTime,
        Self::Address,
        Self::Object,
        Self::Array,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Identifier => "identifier",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::File => "file",
            Self::Ip => "ip",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Address => "address",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Wraps this type as a shareable contract.
    pub fn contract(self) -> Arc<dyn FieldTypeContract> {
        Arc::new(self)
    }

    fn is_text_like(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Email | Self::Phone | Self::Url | Self::File | Self::Ip
        )
    }
}

impl FieldTypeContract for ScalarType {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn default_value(&self, _owner_key: Option<&FieldValue>) -> FieldValue {
        match self {
            Self::Identifier => FieldValue::Text(uuid::Uuid::new_v4().to_string()),
            t if t.is_text_like() => FieldValue::Text(String::new()),
            Self::Boolean => FieldValue::Bool(false),
            Self::Address => {
                let map: Map<String, Value> = ADDRESS_KEYS
                    .iter()
                    .map(|k| ((*k).to_string(), Value::String(String::new())))
                    .collect();
                FieldValue::Json(Value::Object(map))
            }
            Self::Object => FieldValue::Json(Value::Object(Map::new())),
            Self::Array => FieldValue::Json(Value::Array(Vec::new())),
            _ => FieldValue::Null,
        }
    }

    fn is_blank(&self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Json(Value::Object(map)) if *self == Self::Address => {
                map.values().all(json_is_blank)
            }
            FieldValue::Json(Value::Object(map)) => map.is_empty(),
            FieldValue::Json(Value::Array(items)) => items.is_empty(),
            _ => false,
        }
    }

    fn is_valid(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (Self::Text, FieldValue::Text(_)) => true,
            (Self::Identifier, FieldValue::Text(s)) => !s.is_empty(),
            (Self::Identifier, FieldValue::Int(n)) => *n >= 0,
            (Self::Email, FieldValue::Text(s)) => EMAIL_PATTERN.is_match(s),
            (Self::Phone, FieldValue::Text(s)) => PHONE_PATTERN.is_match(s),
            (Self::Url, FieldValue::Text(s)) => URL_PATTERN.is_match(s),
            (Self::File, FieldValue::Text(s)) => !s.trim().is_empty(),
            (Self::Ip, FieldValue::Text(s)) => s.parse::<IpAddr>().is_ok(),
            (Self::Boolean, FieldValue::Bool(_)) => true,
            (Self::Integer, FieldValue::Int(n)) => *n >= 0,
            (Self::Float, FieldValue::Int(n)) => *n >= 0,
            (Self::Float, FieldValue::Float(f)) => f.is_finite() && *f >= 0.0,
            (Self::Date, FieldValue::Date(_)) => true,
            (Self::DateTime, FieldValue::DateTime(_)) => true,
            (Self::Address, FieldValue::Json(Value::Object(map))) => map
                .values()
                .all(|v| matches!(v, Value::String(_) | Value::Null)),
            (Self::Object, FieldValue::Json(Value::Object(_))) => true,
            (Self::Array, FieldValue::Json(Value::Array(_))) => true,
            _ => false,
        }
    }

    fn to_wire(&self, value: &FieldValue) -> Value {
        value.to_json()
    }

    fn from_wire(&self, value: Value) -> FieldValue {
        match (self, value) {
            (_, Value::Null) => FieldValue::Null,
            (t, Value::String(s)) if t.is_text_like() => FieldValue::Text(s),
            (Self::Identifier, Value::String(s)) => FieldValue::Text(s),
            (Self::Identifier, Value::Number(n)) => n
                .as_i64()
                .map_or(FieldValue::Json(Value::Number(n.clone())), FieldValue::Int),
            (Self::Boolean, Value::Bool(b)) => FieldValue::Bool(b),
            (Self::Integer, Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => FieldValue::Int(i),
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    FieldValue::Int(f as i64)
                }
                (None, Some(f)) => FieldValue::Float(f),
                (None, None) => FieldValue::Json(Value::Number(n)),
            },
            (Self::Float, Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => FieldValue::Int(i),
                (None, Some(f)) => FieldValue::Float(f),
                (None, None) => FieldValue::Json(Value::Number(n)),
            },
            (Self::Date, Value::String(s)) => parse_date(&s).map_or(FieldValue::Text(s), FieldValue::Date),
            (Self::DateTime, Value::String(s)) => {
                parse_datetime(&s).map_or(FieldValue::Text(s), FieldValue::DateTime)
            }
            (_, other) => FieldValue::Json(other),
        }
    }
}

fn json_is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Accepts `YYYY-MM-DD` and RFC 3339 timestamps (the calendar day is kept).
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
}

/// Accepts RFC 3339 timestamps and bare dates (midnight UTC).
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

// ── Associations ────────────────────────────────────────────────

/// Field type referencing another schema.
#[derive(Debug, Clone)]
pub struct AssociationContract {
    kind: AssociationKind,
    schema: Arc<Schema>,
    name: String,
}

impl AssociationContract {
    pub fn new(kind: AssociationKind, schema: Arc<Schema>) -> Self {
        let prefix = match kind {
            AssociationKind::BelongsTo => "belongs_to",
            AssociationKind::HasOne => "has_one",
            AssociationKind::HasMany => "has_many",
        };
        let name = format!("{prefix}<{}>", schema.name());
        Self { kind, schema, name }
    }

    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn entity_matches(&self, entity: &Entity) -> bool {
        entity.schema().name() == self.schema.name()
    }

    /// Builds a sub-entity from a wire value: a nested object, or a bare
    /// foreign key that becomes the primary key of a stub.
    fn entity_from_wire(&self, value: Value) -> FieldValue {
        match value {
            Value::Object(_) => match Entity::from_wire(self.schema.clone(), value.clone(), false) {
                Ok(entity) => FieldValue::Entity(Box::new(entity)),
                Err(_) => FieldValue::Json(value),
            },
            key @ (Value::String(_) | Value::Number(_)) => {
                let key = self.schema.primary_key_config().field_type().from_wire(key);
                let mut stub = Entity::with_primary_key(self.schema.clone(), key);
                stub.set_new(false);
                FieldValue::Entity(Box::new(stub))
            }
            other => FieldValue::Json(other),
        }
    }
}

impl FieldTypeContract for AssociationContract {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_value(&self, owner_key: Option<&FieldValue>) -> FieldValue {
        match self.kind {
            AssociationKind::BelongsTo => Entity::new(self.schema.clone()).into(),
            AssociationKind::HasOne => match owner_key {
                Some(key) => Entity::with_primary_key(self.schema.clone(), key.clone()).into(),
                None => Entity::new(self.schema.clone()).into(),
            },
            AssociationKind::HasMany => Collection::new(self.schema.clone()).into(),
        }
    }

    fn is_blank(&self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Null => true,
            FieldValue::Collection(c) => c.is_empty(),
            _ => false,
        }
    }

    fn is_valid(&self, value: &FieldValue) -> bool {
        match (self.kind, value) {
            (AssociationKind::HasMany, FieldValue::Collection(c)) => {
                c.schema().name() == self.schema.name()
            }
            (AssociationKind::BelongsTo | AssociationKind::HasOne, FieldValue::Entity(e)) => {
                self.entity_matches(e)
            }
            _ => false,
        }
    }

    fn to_wire(&self, value: &FieldValue) -> Value {
        match value {
            FieldValue::Entity(e) => e.to_wire_payload(),
            FieldValue::Collection(c) => c.to_wire_payload(),
            other => other.to_json(),
        }
    }

    fn from_wire(&self, value: Value) -> FieldValue {
        match (self.kind, value) {
            (_, Value::Null) => FieldValue::Null,
            (AssociationKind::HasMany, Value::Array(items)) => {
                match Collection::from_wire_items(self.schema.clone(), items.clone(), None, false) {
                    Ok(collection) => FieldValue::Collection(collection),
                    Err(_) => FieldValue::Json(Value::Array(items)),
                }
            }
            (AssociationKind::HasMany, other) => FieldValue::Json(other),
            (_, other) => self.entity_from_wire(other),
        }
    }

    fn association(&self) -> Option<Association<'_>> {
        Some(Association {
            kind: self.kind,
            schema: &self.schema,
        })
    }
}

/// A field owning one foreign-keyed sub-entity of `schema`.
pub fn belongs_to(schema: Arc<Schema>) -> Arc<dyn FieldTypeContract> {
    Arc::new(AssociationContract::new(AssociationKind::BelongsTo, schema))
}

/// A field owning exactly one dependent sub-entity of `schema`, keyed by the
/// owner's primary key.
pub fn has_one(schema: Arc<Schema>) -> Arc<dyn FieldTypeContract> {
    Arc::new(AssociationContract::new(AssociationKind::HasOne, schema))
}

/// A field owning an ordered collection of `schema` entities.
pub fn has_many(schema: Arc<Schema>) -> Arc<dyn FieldTypeContract> {
    Arc::new(AssociationContract::new(AssociationKind::HasMany, schema))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_default_is_fresh_each_call() {
        let a = ScalarType::Identifier.default_value(None);
        let b = ScalarType::Identifier.default_value(None);
        assert_ne!(a, b);
    }

    #[test]
    fn integer_rejects_negative_and_fractional() {
        assert!(ScalarType::Integer.is_valid(&FieldValue::Int(0)));
        assert!(!ScalarType::Integer.is_valid(&FieldValue::Int(-1)));
        assert!(!ScalarType::Integer.is_valid(&FieldValue::Float(1.5)));
    }

    #[test]
    fn integral_float_on_wire_becomes_integer() {
        let v = ScalarType::Integer.from_wire(serde_json::json!(7.0));
        assert_eq!(v, FieldValue::Int(7));
    }

    #[test]
    fn bad_date_is_kept_as_text() {
        let v = ScalarType::Date.from_wire(Value::String("2024-02-30".into()));
        assert_eq!(v, FieldValue::Text("2024-02-30".into()));
        assert!(!ScalarType::Date.is_valid(&v));
    }

    #[test]
    fn address_blank_when_all_parts_blank() {
        let v = ScalarType::Address.default_value(None);
        assert!(ScalarType::Address.is_blank(&v));
        assert!(ScalarType::Address.is_valid(&v));
    }
}
