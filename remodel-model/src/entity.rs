//! Entities: one typed record of a schema.
//!
//! An entity holds one value per schema field (in schema order), a per-field
//! `checked` flag used by validation and serialization, the `is_new` marker,
//! and lifecycle flags. Entities are updated in place through
//! [`Entity::mutate`] so that anything observing an instance keeps seeing the
//! same object.

use crate::error::{ModelError, ModelResult};
use crate::lifecycle::Lifecycle;
use crate::schema::Schema;
use crate::value::FieldValue;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Partial key accepted in place of the primary key field's name.
pub const PRIMARY_KEY_ALIAS: &str = "primaryKey";

/// One record of a [`Schema`].
#[derive(Clone)]
pub struct Entity {
    schema: Arc<Schema>,
    values: Vec<FieldValue>,
    /// Fields given explicitly at construction (not defaulted).
    provided: Vec<bool>,
    pub(crate) checked: Vec<bool>,
    is_new: bool,
    lifecycle: Lifecycle,
}

impl Entity {
    /// Builds an entity with every field defaulted.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::build_raw(schema, HashMap::new())
    }

    /// Builds an entity with the given primary key and defaults elsewhere.
    pub fn with_primary_key(schema: Arc<Schema>, key: impl Into<FieldValue>) -> Self {
        let mut partial = HashMap::new();
        partial.insert(schema.primary_key().to_string(), key.into());
        Self::build_raw(schema, partial)
    }

    /// Builds a new (never persisted) entity from caller-supplied values.
    ///
    /// Names that are not schema fields are ignored. A [`FieldValue::Json`]
    /// destined for an association field is treated as a wire payload and
    /// deserialized recursively.
    pub fn build<I, K, V>(schema: Arc<Schema>, partial: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let partial = partial
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::build_raw(schema, partial)
    }

    /// Raw construction.
    ///
    /// The primary key is taken from `partial[pk]`, then
    /// `partial["primaryKey"]`, then the key field's default factory. Every
    /// other field uses `partial[field]` or its default factory called with
    /// the resolved key.
    pub fn build_raw(schema: Arc<Schema>, mut partial: HashMap<String, FieldValue>) -> Self {
        let pk_index = schema.primary_key_index();
        let pk_config = schema.primary_key_config();
        let explicit_key = partial
            .remove(pk_config.name())
            .or_else(|| partial.remove(PRIMARY_KEY_ALIAS));
        let key_provided = explicit_key.is_some();
        let key = explicit_key.unwrap_or_else(|| pk_config.default_for(None));

        let mut values = Vec::with_capacity(schema.len());
        let mut provided = Vec::with_capacity(schema.len());
        for (i, field) in schema.fields().iter().enumerate() {
            if i == pk_index {
                values.push(key.clone());
                provided.push(key_provided);
                continue;
            }
            match partial.remove(field.name()) {
                Some(FieldValue::Json(raw)) if field.association().is_some() => {
                    values.push(field.field_type().from_wire(raw));
                    provided.push(true);
                }
                Some(value) => {
                    values.push(value);
                    provided.push(true);
                }
                None => {
                    values.push(field.default_for(Some(&key)));
                    provided.push(false);
                }
            }
        }

        if !partial.is_empty() {
            debug!(
                schema = schema.name(),
                ignored = ?partial.keys().collect::<Vec<_>>(),
                "ignoring unknown fields"
            );
        }

        let checked = schema
            .fields()
            .iter()
            .map(|f| f.bypass_validation())
            .collect();

        Self {
            schema,
            values,
            provided,
            checked,
            is_new: true,
            lifecycle: Lifecycle::default(),
        }
    }

    /// Builds an entity from a wire payload (a flat JSON object).
    ///
    /// Every known field goes through its contract's `from_wire`, recursing
    /// into associations.
    pub fn from_wire(schema: Arc<Schema>, payload: Value, is_new: bool) -> ModelResult<Self> {
        let Value::Object(object) = payload else {
            return Err(ModelError::Payload(format!(
                "expected an object for `{}`",
                schema.name()
            )));
        };

        let mut partial = HashMap::with_capacity(object.len());
        for (name, raw) in object {
            let value = match schema.field(&name) {
                Some(field) => field.field_type().from_wire(raw),
                None if name == PRIMARY_KEY_ALIAS => {
                    schema.primary_key_config().field_type().from_wire(raw)
                }
                None => FieldValue::from_json(raw),
            };
            partial.insert(name, value);
        }

        let mut entity = Self::build_raw(schema, partial);
        entity.is_new = is_new;
        debug!(schema = entity.schema.name(), key = %entity.primary_key(), "entity from wire");
        Ok(entity)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn primary_key(&self) -> &FieldValue {
        &self.values[self.schema.primary_key_index()]
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.schema.index_of(field).map(|i| &self.values[i])
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut FieldValue> {
        self.schema.index_of(field).map(move |i| &mut self.values[i])
    }

    /// Overwrites a field. Returns false if the schema has no such field.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> bool {
        match self.schema.index_of(field) {
            Some(i) => {
                self.values[i] = value.into();
                self.provided[i] = true;
                true
            }
            None => false,
        }
    }

    /// Field names and values in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name())
            .zip(self.values.iter())
    }

    /// Whether `field` was given explicitly rather than defaulted.
    pub fn is_provided(&self, field: &str) -> bool {
        self.schema
            .index_of(field)
            .is_some_and(|i| self.provided[i])
    }

    /// True until the entity has been loaded from or saved to the server.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn set_new(&mut self, is_new: bool) {
        self.is_new = is_new;
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    pub(crate) fn value_at(&self, index: usize) -> &FieldValue {
        &self.values[index]
    }

    pub(crate) fn value_at_mut(&mut self, index: usize) -> &mut FieldValue {
        &mut self.values[index]
    }

    /// Updates this entity in place from a freshly built one.
    ///
    /// Only fields `updated` was given explicitly are applied. Nested
    /// entities and collections of the same schema are mutated recursively
    /// instead of replaced; a nested entity whose primary key changed is
    /// rebound to the fresh values in its existing slot. Scalars are
    /// overwritten. Validation flags and lifecycle flags are left alone.
    pub fn mutate(&mut self, updated: Entity) -> ModelResult<()> {
        if updated.schema.name() != self.schema.name() {
            return Err(ModelError::SchemaMismatch {
                expected: self.schema.name().to_string(),
                found: updated.schema.name().to_string(),
            });
        }

        let Entity {
            values, provided, is_new, ..
        } = updated;
        for (i, (value, was_provided)) in values.into_iter().zip(provided).enumerate() {
            if !was_provided {
                continue;
            }
            let slot = &mut self.values[i];
            match (slot, value) {
                (FieldValue::Entity(current), FieldValue::Entity(fresh))
                    if current.schema.name() == fresh.schema.name() =>
                {
                    if current.primary_key() == fresh.primary_key() {
                        current.mutate(*fresh)?;
                    } else {
                        current.rebind(*fresh);
                    }
                }
                (FieldValue::Collection(current), FieldValue::Collection(fresh)) => {
                    current.mutate(fresh, false)?;
                }
                (slot, value) => *slot = value,
            }
            self.provided[i] = true;
        }
        self.is_new = is_new;
        Ok(())
    }

    /// Takes over every value of a record with another primary key. Fields
    /// the fresh record left out fall back to its defaults, and validation
    /// state starts over.
    fn rebind(&mut self, fresh: Entity) {
        let Entity {
            values,
            provided,
            checked,
            is_new,
            ..
        } = fresh;
        self.checked = checked;
        self.values = values;
        self.provided = provided;
        self.is_new = is_new;
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.values == other.values
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Entity");
        s.field("schema", &self.schema.name());
        for (name, value) in self.fields() {
            s.field(name, value);
        }
        s.field("is_new", &self.is_new).finish()
    }
}
