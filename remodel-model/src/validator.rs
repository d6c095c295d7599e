//! Field validation.
//!
//! Every entity carries a `checked` flag per field, initialized from the
//! field's bypass policy. [`Entity::mark_valid`] is the single recursive
//! entry point: it marks the listed fields as checked, descends into
//! associations, and collects every error instead of stopping at the first.
//! Only checked, currently acceptable fields are serialized.

use crate::collection::Collection;
use crate::contract::AssociationKind;
use crate::entity::Entity;
use crate::events::{Event, EventSink, ValidationFailure};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Why a field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    /// The schema has no such field.
    NotFound,
    /// The value is not acceptable.
    NotValid,
    /// The validation spec entry itself is malformed.
    SyntaxError,
}

/// One validation error. Nested fields use dotted paths (`lines.2.sku`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub error: ValidationErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<FieldError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Errors of the given kind.
    pub fn errors_of(&self, kind: ValidationErrorKind) -> impl Iterator<Item = &FieldError> {
        self.errors.iter().filter(move |e| e.error == kind)
    }

    /// Names of the failing fields.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }
}

/// One entry of a validation list.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidSpec {
    /// A direct field.
    Field(String),
    /// An association field and the list to validate inside it.
    Nested(String, Vec<ValidSpec>),
    /// Anything else; reported as a syntax error.
    Invalid(Value),
}

impl ValidSpec {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn nested(name: impl Into<String>, specs: Vec<ValidSpec>) -> Self {
        Self::Nested(name.into(), specs)
    }

    /// Reads one entry: `"name"` or `["name", [...]]`.
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::String(name) => Self::Field(name.clone()),
            Value::Array(pair) => match pair.as_slice() {
                [Value::String(name), nested @ Value::Array(_)] => {
                    Self::Nested(name.clone(), Self::parse_list(nested))
                }
                _ => Self::Invalid(value.clone()),
            },
            other => Self::Invalid(other.clone()),
        }
    }

    /// Reads a JSON list of entries. A non-list is a single invalid entry.
    pub fn parse_list(value: &Value) -> Vec<Self> {
        match value {
            Value::Array(items) => items.iter().map(Self::parse).collect(),
            other => vec![Self::Invalid(other.clone())],
        }
    }
}

impl From<&str> for ValidSpec {
    fn from(name: &str) -> Self {
        Self::Field(name.to_string())
    }
}

impl From<String> for ValidSpec {
    fn from(name: String) -> Self {
        Self::Field(name)
    }
}

/// Validator state of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldState {
    pub checked: bool,
    pub is_valid: bool,
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

impl Entity {
    /// Marks the listed fields as checked and validates them.
    pub fn mark_valid(&mut self, specs: &[ValidSpec]) -> ValidationResult {
        let mut errors = Vec::new();
        self.mark_valid_into(specs, "", &mut errors);
        ValidationResult::from_errors(errors)
    }

    /// Like [`Entity::mark_valid`], and reports a failure to `sink`.
    pub fn valid(&mut self, specs: &[ValidSpec], sink: &dyn EventSink) -> ValidationResult {
        let result = self.mark_valid(specs);
        if !result.is_valid {
            warn!(
                schema = self.schema().name(),
                errors = result.errors.len(),
                "validation failed"
            );
            sink.emit(&Event::ValidationFailed(ValidationFailure {
                schema: self.schema().name().to_string(),
                errors: result.errors.clone(),
            }));
        }
        result
    }

    pub(crate) fn mark_valid_into(
        &mut self,
        specs: &[ValidSpec],
        prefix: &str,
        errors: &mut Vec<FieldError>,
    ) {
        for spec in specs {
            match spec {
                ValidSpec::Field(name) => self.check_field(name, prefix, errors),
                ValidSpec::Nested(name, nested) => self.check_nested(name, nested, prefix, errors),
                ValidSpec::Invalid(raw) => errors.push(FieldError {
                    field: join(prefix, &raw.to_string()),
                    error: ValidationErrorKind::SyntaxError,
                    value: Some(raw.clone()),
                }),
            }
        }
    }

    /// Marks `name` checked and records an error if it is missing or unacceptable.
    fn check_field(&mut self, name: &str, prefix: &str, errors: &mut Vec<FieldError>) {
        let Some(index) = self.schema().index_of(name) else {
            errors.push(FieldError {
                field: join(prefix, name),
                error: ValidationErrorKind::NotFound,
                value: None,
            });
            return;
        };
        self.checked[index] = true;
        if !self.is_acceptable_at(index) {
            errors.push(FieldError {
                field: join(prefix, name),
                error: ValidationErrorKind::NotValid,
                value: Some(self.value_at(index).to_json()),
            });
        }
    }

    fn check_nested(
        &mut self,
        name: &str,
        nested: &[ValidSpec],
        prefix: &str,
        errors: &mut Vec<FieldError>,
    ) {
        let schema = self.schema().clone();
        let Some(index) = schema.index_of(name) else {
            errors.push(FieldError {
                field: join(prefix, name),
                error: ValidationErrorKind::NotFound,
                value: None,
            });
            return;
        };
        let path = join(prefix, name);
        let Some(association) = schema.fields()[index].association() else {
            errors.push(FieldError {
                field: path,
                error: ValidationErrorKind::SyntaxError,
                value: Some(Value::String(name.to_string())),
            });
            return;
        };

        self.checked[index] = true;
        match association.kind {
            AssociationKind::BelongsTo | AssociationKind::HasOne => {
                if let Some(sub) = self.value_at_mut(index).as_entity_mut() {
                    sub.mark_valid_into(nested, &path, errors);
                } else if !self.is_acceptable_at(index) {
                    errors.push(FieldError {
                        field: path,
                        error: ValidationErrorKind::NotValid,
                        value: Some(self.value_at(index).to_json()),
                    });
                }
            }
            AssociationKind::HasMany => {
                if !self.is_acceptable_at(index) {
                    errors.push(FieldError {
                        field: path.clone(),
                        error: ValidationErrorKind::NotValid,
                        value: None,
                    });
                }
                if let Some(items) = self.value_at_mut(index).as_collection_mut() {
                    items.mark_valid_into(nested, &path, errors);
                }
            }
        }
    }

    fn is_acceptable_at(&self, index: usize) -> bool {
        self.schema().fields()[index].is_acceptable(self.value_at(index), self)
    }

    /// `checked && !acceptable`. Cheap enough to call on every render.
    pub fn error(&self, field: &str) -> bool {
        self.field_state(field)
            .is_some_and(|state| state.checked && !state.is_valid)
    }

    pub fn is_checked(&self, field: &str) -> bool {
        self.schema()
            .index_of(field)
            .is_some_and(|i| self.checked[i])
    }

    /// Current validator state of a field.
    pub fn field_state(&self, field: &str) -> Option<FieldState> {
        let index = self.schema().index_of(field)?;
        Some(FieldState {
            checked: self.checked[index],
            is_valid: self.is_acceptable_at(index),
        })
    }

    /// Resets every `checked` flag to the field's bypass policy.
    pub fn reset_validation(&mut self) {
        let schema = self.schema().clone();
        for (flag, field) in self.checked.iter_mut().zip(schema.fields()) {
            *flag = field.bypass_validation();
        }
    }
}

impl Collection {
    /// Validates every item with the same list, aggregating errors.
    pub fn mark_valid(&mut self, specs: &[ValidSpec]) -> ValidationResult {
        let mut errors = Vec::new();
        self.mark_valid_into(specs, "", &mut errors);
        ValidationResult::from_errors(errors)
    }

    pub(crate) fn mark_valid_into(
        &mut self,
        specs: &[ValidSpec],
        prefix: &str,
        errors: &mut Vec<FieldError>,
    ) {
        for (i, item) in self.iter_mut().enumerate() {
            let path = join(prefix, &i.to_string());
            item.mark_valid_into(specs, &path, errors);
        }
    }
}
