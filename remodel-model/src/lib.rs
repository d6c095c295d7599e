//! Schema-driven entity model for remodel.
//!
//! Maps typed, schema-described records onto JSON payloads and back:
//! - [`FieldTypeContract`]: default, blankness, validity and wire conversions of one field type
//! - [`TypeRegistry`] / [`SchemaCompiler`]: compile raw field descriptions into a [`Schema`]
//! - [`Entity`] / [`Collection`] / [`Record`]: typed records, built with defaults and mutated in place
//! - [`ValidSpec`] / [`ValidationResult`]: per-field validation with recursive descent into associations
//! - [`Lifecycle`]: fetch/save in-progress, success and failure flags
//! - [`Observers`]: explicit sinks for fetch and validation failure events
//!
//! The crate performs no I/O; `remodel-client` drives requests and feeds
//! responses back through [`WireRecord::absorb`].
//!
//! # Example
//!
//! ```
//! use remodel_model::{FieldSpec, ScalarType, SchemaCompiler, Entity, ValidSpec};
//!
//! let schema = SchemaCompiler::default()
//!     .compile("users", [
//!         ("id", FieldSpec::scalar(ScalarType::Identifier).primary_key()),
//!         ("email", FieldSpec::scalar(ScalarType::Email)),
//!     ])
//!     .unwrap();
//!
//! let mut user = Entity::build(schema, [("email", "ada@example.com")]);
//! let result = user.mark_valid(&[ValidSpec::field("email")]);
//! assert!(result.is_valid);
//! assert_eq!(user.to_wire_payload()["email"], "ada@example.com");
//! ```

mod collection;
mod contract;
mod entity;
mod error;
mod events;
mod lifecycle;
mod query;
mod record;
mod registry;
mod schema;
mod validator;
mod value;
mod wire;

pub use collection::{Collection, ItemRef, NewItem, Toggled};
pub use contract::{
    ADDRESS_KEYS, Association, AssociationContract, AssociationKind, FieldTypeContract,
    ScalarType, belongs_to, has_many, has_one,
};
pub use entity::{Entity, PRIMARY_KEY_ALIAS};
pub use error::{ConfigError, ModelError, ModelResult};
pub use events::{Event, EventSink, FetchFailure, NullSink, Observers, ValidationFailure};
pub use lifecycle::{Lifecycle, Operation, OperationState, Phase};
pub use query::{DEFAULT_LIMIT, Query, QueryValue};
pub use record::{Record, WireRecord};
pub use registry::TypeRegistry;
pub use schema::{
    BypassPolicy, CustomValid, DefaultFactory, DefaultValue, FieldConfig, FieldSpec, Schema,
    SchemaCompiler, SchemaConfig,
};
pub use validator::{FieldError, FieldState, ValidSpec, ValidationErrorKind, ValidationResult};
pub use value::FieldValue;
pub use wire::{CollectionPayload, ResponseKeys, parse_collection_payload};
