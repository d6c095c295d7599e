//! The closed entity-or-collection variant and the operations shared by both.

use crate::collection::Collection;
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::lifecycle::Lifecycle;
use crate::schema::Schema;
use crate::wire::{ResponseKeys, parse_collection_payload};
use serde_json::Value;
use std::sync::Arc;

/// Behavior shared by everything a request can fill in place.
pub trait WireRecord {
    fn schema(&self) -> &Arc<Schema>;

    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    fn to_wire_payload(&self) -> Value;

    /// Builds a fresh record (`is_new = false`) from a server payload and
    /// mutates `self` with it.
    fn absorb(&mut self, payload: Value, keys: &ResponseKeys, extend: bool) -> ModelResult<()>;
}

impl WireRecord for Entity {
    fn schema(&self) -> &Arc<Schema> {
        Entity::schema(self)
    }

    fn lifecycle(&self) -> &Lifecycle {
        Entity::lifecycle(self)
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        Entity::lifecycle_mut(self)
    }

    fn to_wire_payload(&self) -> Value {
        Entity::to_wire_payload(self)
    }

    fn absorb(&mut self, payload: Value, _keys: &ResponseKeys, _extend: bool) -> ModelResult<()> {
        let fresh = Entity::from_wire(self.schema().clone(), payload, false)?;
        self.mutate(fresh)
    }
}

impl WireRecord for Collection {
    fn schema(&self) -> &Arc<Schema> {
        Collection::schema(self)
    }

    fn lifecycle(&self) -> &Lifecycle {
        Collection::lifecycle(self)
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        Collection::lifecycle_mut(self)
    }

    fn to_wire_payload(&self) -> Value {
        Collection::to_wire_payload(self)
    }

    fn absorb(&mut self, payload: Value, keys: &ResponseKeys, extend: bool) -> ModelResult<()> {
        let parsed = parse_collection_payload(payload, keys)?;
        let fresh = Collection::from_wire_items(self.schema().clone(), parsed.items, parsed.count, false)?;
        self.mutate(fresh, extend)
    }
}

/// An entity or a collection, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Entity(Entity),
    Collection(Collection),
}

impl Record {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Entity(_) => "entity",
            Self::Collection(_) => "collection",
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            Self::Collection(_) => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Self::Collection(c) => Some(c),
            Self::Entity(_) => None,
        }
    }

    /// Mutates in place with a fresh record of the same kind.
    pub fn mutate(&mut self, fresh: Record, extend: bool) -> ModelResult<()> {
        match (self, fresh) {
            (Self::Entity(current), Self::Entity(fresh)) => current.mutate(fresh),
            (Self::Collection(current), Self::Collection(fresh)) => current.mutate(fresh, extend),
            (current, fresh) => Err(ModelError::RecordKind {
                target: current.kind_name(),
                source_kind: fresh.kind_name(),
            }),
        }
    }
}

impl WireRecord for Record {
    fn schema(&self) -> &Arc<Schema> {
        match self {
            Self::Entity(e) => e.schema(),
            Self::Collection(c) => c.schema(),
        }
    }

    fn lifecycle(&self) -> &Lifecycle {
        match self {
            Self::Entity(e) => e.lifecycle(),
            Self::Collection(c) => c.lifecycle(),
        }
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        match self {
            Self::Entity(e) => e.lifecycle_mut(),
            Self::Collection(c) => c.lifecycle_mut(),
        }
    }

    fn to_wire_payload(&self) -> Value {
        match self {
            Self::Entity(e) => e.to_wire_payload(),
            Self::Collection(c) => c.to_wire_payload(),
        }
    }

    fn absorb(&mut self, payload: Value, keys: &ResponseKeys, extend: bool) -> ModelResult<()> {
        match self {
            Self::Entity(e) => WireRecord::absorb(e, payload, keys, extend),
            Self::Collection(c) => WireRecord::absorb(c, payload, keys, extend),
        }
    }
}

impl From<Entity> for Record {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<Collection> for Record {
    fn from(collection: Collection) -> Self {
        Self::Collection(collection)
    }
}
