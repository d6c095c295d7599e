//! Registration table of field types, keyed by type name.

use crate::contract::{FieldTypeContract, ScalarType};
use std::collections::HashMap;
use std::sync::Arc;

/// Named field types available to the schema compiler.
///
/// The table is only extended through [`TypeRegistry::register`]; there is no
/// shared global instance.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<dyn FieldTypeContract>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every [`ScalarType`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for scalar in ScalarType::ALL {
            registry.register(scalar.as_str(), scalar.contract());
        }
        registry
    }

    /// Registers a contract under `name`, returning the one it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        contract: Arc<dyn FieldTypeContract>,
    ) -> Option<Arc<dyn FieldTypeContract>> {
        self.types.insert(name.into(), contract)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FieldTypeContract>> {
        self.types.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
