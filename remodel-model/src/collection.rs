//! Collections: ordered entities of one schema plus a server-side total.
//!
//! `total_count` may exceed the number of loaded items (pagination). It is
//! overwritten by server-supplied counts and adjusted by exactly one on
//! [`Collection::add`] and [`Collection::remove`]; it is never recomputed
//! from the loaded length otherwise. All lookups are linear scans.

use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::lifecycle::Lifecycle;
use crate::query::Query;
use crate::schema::Schema;
use crate::value::FieldValue;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Identifies an item of a collection.
pub enum ItemRef<'a> {
    /// Match by primary key value.
    Key(FieldValue),
    /// Match by the primary key of another entity.
    Entity(&'a Entity),
    /// Match by predicate.
    Predicate(&'a dyn Fn(&Entity) -> bool),
}

impl ItemRef<'_> {
    pub fn matches(&self, item: &Entity) -> bool {
        match self {
            Self::Key(key) => keys_equal(item.primary_key(), key),
            Self::Entity(other) => keys_equal(item.primary_key(), other.primary_key()),
            Self::Predicate(pred) => pred(item),
        }
    }
}

impl<'a> From<&'a Entity> for ItemRef<'a> {
    fn from(entity: &'a Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<FieldValue> for ItemRef<'_> {
    fn from(key: FieldValue) -> Self {
        Self::Key(key)
    }
}

impl From<&str> for ItemRef<'_> {
    fn from(key: &str) -> Self {
        Self::Key(key.into())
    }
}

impl From<i64> for ItemRef<'_> {
    fn from(key: i64) -> Self {
        Self::Key(key.into())
    }
}

/// Keys compare equal across text/integer representations (`"7"` == `7`).
fn keys_equal(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Text(s), FieldValue::Int(n)) | (FieldValue::Int(n), FieldValue::Text(s)) => {
            s.parse::<i64>().is_ok_and(|parsed| parsed == *n)
        }
        _ => a == b,
    }
}

/// Something [`Collection::add`] can turn into an item.
#[derive(Debug, Clone)]
pub enum NewItem {
    Entity(Entity),
    Payload(Value),
}

impl From<Entity> for NewItem {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<Value> for NewItem {
    fn from(payload: Value) -> Self {
        Self::Payload(payload)
    }
}

/// Outcome of [`Collection::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Added,
    Removed(usize),
}

/// Ordered entities of one schema.
#[derive(Clone)]
pub struct Collection {
    schema: Arc<Schema>,
    items: Vec<Entity>,
    total_count: usize,
    lifecycle: Lifecycle,
    query: Option<Query>,
}

impl Collection {
    /// An empty collection.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            items: Vec::new(),
            total_count: 0,
            lifecycle: Lifecycle::default(),
            query: None,
        }
    }

    /// Wraps existing entities. `total_count` defaults to their number.
    pub fn from_entities(
        schema: Arc<Schema>,
        items: Vec<Entity>,
        total_count: Option<usize>,
    ) -> ModelResult<Self> {
        for item in &items {
            check_schema(&schema, item)?;
        }
        let total_count = total_count.unwrap_or(items.len());
        Ok(Self {
            items,
            total_count,
            ..Self::new(schema)
        })
    }

    /// Builds one entity per raw payload.
    pub fn from_wire_items(
        schema: Arc<Schema>,
        payloads: Vec<Value>,
        total_count: Option<usize>,
        is_new: bool,
    ) -> ModelResult<Self> {
        let items = payloads
            .into_iter()
            .map(|p| Entity::from_wire(schema.clone(), p, is_new))
            .collect::<ModelResult<Vec<_>>>()?;
        Self::from_entities(schema, items, total_count)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn items(&self) -> &[Entity] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.items.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entity> {
        self.items.get_mut(index)
    }

    /// Number of loaded items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Server-side total.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// True when the server holds more items than are loaded.
    pub fn has_more(&self) -> bool {
        self.items.len() < self.total_count
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    /// Parameters of the last collection request, replayed by paging.
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn set_query(&mut self, query: Query) {
        self.query = Some(query);
    }

    /// Finds an item by primary key.
    pub fn find(&self, key: impl Into<FieldValue>) -> Option<&Entity> {
        let item = ItemRef::Key(key.into());
        self.items.iter().find(|e| item.matches(e))
    }

    pub fn find_mut(&mut self, key: impl Into<FieldValue>) -> Option<&mut Entity> {
        let item = ItemRef::Key(key.into());
        self.items.iter_mut().find(|e| item.matches(e))
    }

    /// Index of the first matching item.
    pub fn position<'a>(&self, item: impl Into<ItemRef<'a>>) -> Option<usize> {
        let item = item.into();
        self.items.iter().position(|e| item.matches(e))
    }

    pub fn exists<'a>(&self, item: impl Into<ItemRef<'a>>) -> bool {
        self.position(item).is_some()
    }

    /// Removes the first matching item and decrements `total_count`.
    ///
    /// Returns the removed index, or `None` when nothing matched (no-op).
    pub fn remove<'a>(&mut self, item: impl Into<ItemRef<'a>>) -> Option<usize> {
        let index = self.position(item)?;
        self.items.remove(index);
        self.total_count = self.total_count.saturating_sub(1);
        Some(index)
    }

    /// Appends an item, constructing it from a payload if needed, and
    /// increments `total_count`.
    pub fn add(&mut self, item: impl Into<NewItem>) -> ModelResult<&mut Entity> {
        let entity = match item.into() {
            NewItem::Entity(entity) => {
                check_schema(&self.schema, &entity)?;
                entity
            }
            NewItem::Payload(payload) => Entity::from_wire(self.schema.clone(), payload, true)?,
        };
        self.items.push(entity);
        self.total_count += 1;
        let last = self.items.len() - 1;
        Ok(&mut self.items[last])
    }

    /// Removes the item if present, otherwise adds it.
    pub fn toggle(&mut self, item: Entity) -> ModelResult<Toggled> {
        if let Some(index) = self.remove(&item) {
            return Ok(Toggled::Removed(index));
        }
        self.add(item)?;
        Ok(Toggled::Added)
    }

    /// Updates this collection in place from a freshly built one.
    ///
    /// With `extend` the fresh items are appended, otherwise they replace the
    /// current ones. `total_count` takes the fresh count, never less than
    /// the loaded length.
    pub fn mutate(&mut self, updated: Collection, extend: bool) -> ModelResult<()> {
        if updated.schema.name() != self.schema.name() {
            return Err(ModelError::SchemaMismatch {
                expected: self.schema.name().to_string(),
                found: updated.schema.name().to_string(),
            });
        }
        if extend {
            self.items.extend(updated.items);
        } else {
            self.items = updated.items;
        }
        self.total_count = updated.total_count.max(self.items.len());
        Ok(())
    }
}

fn check_schema(schema: &Schema, entity: &Entity) -> ModelResult<()> {
    if entity.schema().name() == schema.name() {
        Ok(())
    } else {
        Err(ModelError::SchemaMismatch {
            expected: schema.name().to_string(),
            found: entity.schema().name().to_string(),
        })
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.total_count == other.total_count
            && self.items == other.items
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("schema", &self.schema.name())
            .field("total_count", &self.total_count)
            .field("items", &self.items)
            .finish()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
