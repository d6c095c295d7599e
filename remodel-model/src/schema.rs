//! Schemas and the schema compiler.
//!
//! A raw field description ([`FieldSpec`], or a JSON object resolved through
//! the [`TypeRegistry`]) is compiled once per entity kind into a [`Schema`]:
//! defaults are normalized to factories, the primary key is located, and the
//! bypass-validation policy is applied. Compilation is the only place where
//! configuration errors can occur.

use crate::contract::{Association, FieldTypeContract, ScalarType};
use crate::entity::Entity;
use crate::error::ConfigError;
use crate::registry::TypeRegistry;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default factory; the argument is the primary key of the record being built.
pub type DefaultFactory = Arc<dyn Fn(Option<&FieldValue>) -> FieldValue + Send + Sync>;

/// Per-field predicate run on top of the type's own rules.
pub type CustomValid = Arc<dyn Fn(&FieldValue, &Entity) -> bool + Send + Sync>;

/// A declared default, before normalization.
#[derive(Clone)]
pub enum DefaultValue {
    Constant(FieldValue),
    Factory(DefaultFactory),
}

impl DefaultValue {
    fn into_factory(self) -> DefaultFactory {
        match self {
            Self::Constant(value) => Arc::new(move |_: Option<&FieldValue>| value.clone()),
            Self::Factory(factory) => factory,
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

// ── Raw field description ───────────────────────────────────────

/// Uncompiled description of one field.
#[derive(Clone, Default)]
pub struct FieldSpec {
    field_type: Option<Arc<dyn FieldTypeContract>>,
    type_name: Option<String>,
    default: Option<DefaultValue>,
    allow_blank: bool,
    primary_key: bool,
    custom_valid: Option<CustomValid>,
}

impl FieldSpec {
    /// A field of the given contract.
    pub fn new(field_type: Arc<dyn FieldTypeContract>) -> Self {
        Self {
            field_type: Some(field_type),
            ..Self::default()
        }
    }

    /// A field of a built-in scalar type.
    pub fn scalar(scalar: ScalarType) -> Self {
        Self::new(scalar.contract())
    }

    /// A field whose type is looked up in the registry at compile time.
    pub fn named(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    /// Marks the field as the schema's primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Lets blank values pass validation.
    pub fn allow_blank(mut self) -> Self {
        self.allow_blank = true;
        self
    }

    /// Overrides the type's default with a constant.
    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(DefaultValue::Constant(value.into()));
        self
    }

    /// Overrides the type's default with a factory receiving the owner's key.
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn(Option<&FieldValue>) -> FieldValue + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    /// Adds a custom predicate; it receives the value and the owning entity.
    pub fn validate_with<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FieldValue, &Entity) -> bool + Send + Sync + 'static,
    {
        self.custom_valid = Some(Arc::new(predicate));
        self
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("field_type", &self.field_type.as_ref().map(|t| t.name().to_string()))
            .field("type_name", &self.type_name)
            .field("default", &self.default)
            .field("allow_blank", &self.allow_blank)
            .field("primary_key", &self.primary_key)
            .finish_non_exhaustive()
    }
}

// ── Compiled field ──────────────────────────────────────────────

/// A compiled field: contract plus normalized options.
#[derive(Clone)]
pub struct FieldConfig {
    name: String,
    field_type: Arc<dyn FieldTypeContract>,
    default: DefaultFactory,
    allow_blank: bool,
    primary_key: bool,
    bypass_validation: bool,
    custom_valid: CustomValid,
}

impl FieldConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &Arc<dyn FieldTypeContract> {
        &self.field_type
    }

    pub fn allow_blank(&self) -> bool {
        self.allow_blank
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Whether the field starts out `checked` (and is therefore always sent).
    pub fn bypass_validation(&self) -> bool {
        self.bypass_validation
    }

    pub fn association(&self) -> Option<Association<'_>> {
        self.field_type.association()
    }

    /// Invokes the default factory.
    pub fn default_for(&self, owner_key: Option<&FieldValue>) -> FieldValue {
        (self.default)(owner_key)
    }

    /// `(blank && allow_blank) || (!blank && valid)`, and the custom predicate.
    pub fn is_acceptable(&self, value: &FieldValue, owner: &Entity) -> bool {
        let blank = self.field_type.is_blank(value);
        let typed = if blank {
            self.allow_blank
        } else {
            self.field_type.is_valid(value)
        };
        typed && (self.custom_valid)(value, owner)
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("name", &self.name)
            .field("field_type", &self.field_type.name())
            .field("allow_blank", &self.allow_blank)
            .field("primary_key", &self.primary_key)
            .field("bypass_validation", &self.bypass_validation)
            .finish_non_exhaustive()
    }
}

// ── Schema configuration ────────────────────────────────────────

/// Which non-key fields skip validation and are always sent.
///
/// The primary key always bypasses validation regardless of this list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassPolicy {
    pub always_sent: Vec<String>,
}

impl BypassPolicy {
    /// A policy where only the primary key bypasses validation.
    pub fn primary_key_only() -> Self {
        Self {
            always_sent: Vec::new(),
        }
    }

    pub fn bypasses(&self, field: &str, is_primary_key: bool) -> bool {
        is_primary_key || self.always_sent.iter().any(|f| f == field)
    }
}

impl Default for BypassPolicy {
    fn default() -> Self {
        Self {
            always_sent: vec!["created_at".to_string(), "updated_at".to_string()],
        }
    }
}

/// Per-schema settings captured at compile time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Endpoint path relative to the client base URL. Defaults to the schema name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Whether requests must carry a bearer token.
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub bypass: BypassPolicy,
}

impl SchemaConfig {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn bypass(mut self, bypass: BypassPolicy) -> Self {
        self.bypass = bypass;
        self
    }
}

// ── Schema ──────────────────────────────────────────────────────

/// A compiled, immutable entity description.
#[derive(Debug)]
pub struct Schema {
    name: String,
    fields: Vec<FieldConfig>,
    index: HashMap<String, usize>,
    primary_key: usize,
    config: SchemaConfig,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldConfig] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn primary_key_index(&self) -> usize {
        self.primary_key
    }

    /// Name of the primary key field.
    pub fn primary_key(&self) -> &str {
        &self.fields[self.primary_key].name
    }

    pub fn primary_key_config(&self) -> &FieldConfig {
        &self.fields[self.primary_key]
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Endpoint path, falling back to the schema name.
    pub fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(&self.name)
    }

    pub fn requires_auth(&self) -> bool {
        self.config.requires_auth
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ── Compiler ────────────────────────────────────────────────────

/// Turns raw field descriptions into [`Schema`]s.
#[derive(Debug, Clone)]
pub struct SchemaCompiler {
    registry: TypeRegistry,
    config: SchemaConfig,
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self::new(TypeRegistry::with_builtins())
    }
}

impl SchemaCompiler {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            config: SchemaConfig::default(),
        }
    }

    /// Sets the configuration used by [`SchemaCompiler::compile`].
    pub fn with_config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    /// Compiles a schema with the compiler's configuration.
    pub fn compile<I, K>(&self, name: &str, fields: I) -> Result<Arc<Schema>, ConfigError>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        self.compile_with(name, self.config.clone(), fields)
    }

    /// Compiles a schema with an explicit configuration.
    pub fn compile_with<I, K>(
        &self,
        name: &str,
        config: SchemaConfig,
        fields: I,
    ) -> Result<Arc<Schema>, ConfigError>
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        let mut compiled = Vec::new();
        let mut index = HashMap::new();

        for (field_name, spec) in fields {
            let field_name: String = field_name.into();
            if index.contains_key(&field_name) {
                return Err(ConfigError::DuplicateField {
                    schema: name.to_string(),
                    field: field_name,
                });
            }
            let field_type = self.resolve_type(name, &field_name, &spec)?;
            let default = spec
                .default
                .unwrap_or_else(|| {
                    let contract = field_type.clone();
                    DefaultValue::Factory(Arc::new(move |key: Option<&FieldValue>| {
                        contract.default_value(key)
                    }))
                })
                .into_factory();
            let bypass_validation = config.bypass.bypasses(&field_name, spec.primary_key);

            index.insert(field_name.clone(), compiled.len());
            compiled.push(FieldConfig {
                name: field_name,
                field_type,
                default,
                allow_blank: spec.allow_blank,
                primary_key: spec.primary_key,
                bypass_validation,
                custom_valid: spec
                    .custom_valid
                    .unwrap_or_else(|| Arc::new(|_: &FieldValue, _: &Entity| true)),
            });
        }

        let keys: Vec<usize> = compiled
            .iter()
            .enumerate()
            .filter(|(_, f)| f.primary_key)
            .map(|(i, _)| i)
            .collect();
        let primary_key = match keys.as_slice() {
            [single] => *single,
            [] => return Err(ConfigError::NoPrimaryKey(name.to_string())),
            many => {
                return Err(ConfigError::MultiplePrimaryKeys {
                    schema: name.to_string(),
                    fields: many.iter().map(|&i| compiled[i].name.clone()).collect(),
                });
            }
        };

        debug!(
            schema = name,
            fields = compiled.len(),
            primary_key = %compiled[primary_key].name,
            "compiled schema"
        );

        Ok(Arc::new(Schema {
            name: name.to_string(),
            fields: compiled,
            index,
            primary_key,
            config,
        }))
    }

    /// Compiles a JSON description of the form
    /// `{"field": {"type": "email", "allow_blank": true, "primary_key": false, "default": ...}}`.
    ///
    /// Field order follows the JSON object's key order.
    pub fn compile_json(&self, name: &str, raw: &Value) -> Result<Arc<Schema>, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRaw {
            schema: name.to_string(),
            reason,
        };
        let object = raw
            .as_object()
            .ok_or_else(|| invalid("expected an object of fields".to_string()))?;

        let mut specs = Vec::with_capacity(object.len());
        for (field_name, raw_field) in object {
            let raw_field = raw_field
                .as_object()
                .ok_or_else(|| invalid(format!("field `{field_name}` is not an object")))?;

            let mut spec = match raw_field.get("type") {
                None | Some(Value::Null) => FieldSpec::default(),
                Some(Value::String(type_name)) => FieldSpec::named(type_name.clone()),
                Some(_) => return Err(invalid(format!("field `{field_name}` has a non-string type"))),
            };
            spec.allow_blank = flag(raw_field.get("allow_blank"));
            spec.primary_key = flag(raw_field.get("primary_key"));
            if let Some(default) = raw_field.get("default") {
                let contract = self.resolve_type(name, field_name, &spec)?;
                spec.default = Some(DefaultValue::Constant(contract.from_wire(default.clone())));
            }
            specs.push((field_name.clone(), spec));
        }

        self.compile(name, specs)
    }

    fn resolve_type(
        &self,
        schema: &str,
        field: &str,
        spec: &FieldSpec,
    ) -> Result<Arc<dyn FieldTypeContract>, ConfigError> {
        if let Some(field_type) = &spec.field_type {
            return Ok(field_type.clone());
        }
        let type_name = spec.type_name.as_deref().ok_or_else(|| ConfigError::MissingType {
            schema: schema.to_string(),
            field: field.to_string(),
        })?;
        self.registry
            .get(type_name)
            .ok_or_else(|| ConfigError::UnknownType {
                schema: schema.to_string(),
                field: field.to_string(),
                type_name: type_name.to_string(),
            })
    }
}

fn flag(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(false)
}
